//! Shell command - a long-lived session that locks itself when idle.
//!
//! Reads one command per line from stdin. Every command counts as activity;
//! after the idle timeout the vault locks and `unlock` asks for the master
//! password again (read from the next stdin line with `--password-stdin`).
//!
//! # Examples
//!
//! ```bash
//! sealvault shell --auto-lock 60
//! sealvault> search git
//! sealvault> get 3f2a --show
//! sealvault> quit
//! ```

use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use sealvault_core::error::SessionError;
use sealvault_core::vault::{SessionOptions, VaultLayout, VaultSession};

use super::{categories, get, ls, search};
use crate::config::Config;
use crate::{PasswordOptions, unlock_vault};

const HELP: &str = "\
Commands:
  ls [CATEGORY]        list entries, optionally in one category
  search QUERY         search titles, usernames, websites and notes
  get ID [--show]      show an entry (id or unique prefix)
  categories           list categories in use
  status               show whether the vault is locked
  lock                 lock now
  unlock               unlock again after a lock
  help                 show this help
  quit                 leave the shell";

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Idle seconds before auto-lock, 0 to disable (default: config, else 300)
    #[arg(long, value_name = "SECS")]
    pub auto_lock: Option<u64>,
}

enum Flow {
    Continue,
    Quit,
}

/// State the shell needs to unlock again after a lock
struct Unlocker<'a> {
    layout: &'a VaultLayout,
    password_opts: &'a PasswordOptions,
    options: SessionOptions,
}

impl Unlocker<'_> {
    fn unlock(&self) -> Result<VaultSession> {
        unlock_vault(self.layout, self.password_opts, &self.options)
    }
}

#[instrument(level = "info", name = "cmd::shell", skip_all)]
pub fn execute(
    layout: &VaultLayout,
    config: &Config,
    password_opts: &PasswordOptions,
    args: &Args,
) -> Result<()> {
    let options = match args.auto_lock {
        Some(0) => SessionOptions::without_auto_lock(),
        Some(secs) => SessionOptions {
            auto_lock: Some(Duration::from_secs(secs)),
        },
        None => config.session_options(),
    };
    let unlocker = Unlocker {
        layout,
        password_opts,
        options,
    };

    let mut session = unlocker.unlock()?;
    let interactive = io::stdin().is_terminal();
    if interactive {
        eprintln!("Vault unlocked. Type `help` for commands.");
    }

    let mut line = String::new();
    loop {
        if interactive {
            eprint!("sealvault> ");
            io::stderr().flush()?;
        }

        line.clear();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match run_line(&mut session, &unlocker, input) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) if matches!(e.downcast_ref::<SessionError>(), Some(SessionError::Locked)) => {
                eprintln!("Vault is locked; type `unlock` to continue");
            }
            Err(e) => eprintln!("Error: {e:#}"),
        }
    }

    session.lock();
    Ok(())
}

fn run_line(session: &mut VaultSession, unlocker: &Unlocker<'_>, input: &str) -> Result<Flow> {
    let (command, rest) = input
        .split_once(char::is_whitespace)
        .map_or((input, ""), |(command, rest)| (command, rest.trim()));

    match command {
        "quit" | "exit" => return Ok(Flow::Quit),
        "help" => println!("{HELP}"),
        "status" => println!("{}", if session.is_locked() { "locked" } else { "unlocked" }),
        "lock" => {
            session.lock();
            println!("Locked");
        }
        "unlock" => {
            if session.is_locked() {
                *session = unlocker.unlock()?;
                println!("Unlocked");
            } else {
                session.touch()?;
                println!("Already unlocked");
            }
        }
        "ls" => {
            let args = ls::Args {
                categories: if rest.is_empty() { Vec::new() } else { vec![rest.to_string()] },
                json: false,
                ids_only: false,
            };
            ls::execute(session, &args)?;
        }
        "search" => {
            if rest.is_empty() {
                bail!("Usage: search QUERY");
            }
            let args = search::Args {
                query: rest.to_string(),
                categories: Vec::new(),
                json: false,
            };
            search::execute(session, &args)?;
        }
        "get" => {
            let mut id = None;
            let mut show = false;
            for token in rest.split_whitespace() {
                match token {
                    "--show" | "-s" => show = true,
                    other => id = Some(other.to_string()),
                }
            }
            let Some(id) = id else {
                bail!("Usage: get ID [--show]");
            };
            let args = get::Args {
                id,
                show,
                password_only: false,
                json: false,
            };
            get::execute(session, &args)?;
        }
        "categories" => categories::execute(session, &categories::Args { json: false })?,
        other => bail!("Unknown command '{other}'; type `help`"),
    }

    Ok(Flow::Continue)
}
