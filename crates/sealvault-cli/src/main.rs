#![deny(unsafe_code)]

// Use mimalloc for reduced allocation latency (enabled by default).
// Disable with `--no-default-features` if debugging allocator issues.
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod auth;
mod commands;
mod config;
mod exit_code;
mod output;

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sealvault_core::error::{SaltError, SessionError, StoreError};
use sealvault_core::vault::{SessionOptions, VaultLayout, VaultSession};

use crate::commands::{
    LookupError, add, categories, completions, edit, generate, get, info, init, ls, rm, search,
    shell,
};
use crate::config::Config;

/// Encrypted password manager
#[derive(Parser)]
#[command(name = "sealvault")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Create a vault (prompts for a master password)
    sealvault init

    # Store a credential with a generated password
    sealvault add GitHub -u octocat -w https://github.com --generate

    # Look it up by id prefix and print only the password
    sealvault get 3f2a --password-only

    # Scripted use (pipe the master password from a secret manager)
    echo \"$SECRET\" | sealvault --password-stdin search git
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Vault directory (default: config `vault.path`, then the platform data dir)
    #[arg(long, value_name = "DIR", env = "SEALVAULT_DIR", global = true)]
    vault_dir: Option<PathBuf>,

    /// Master password (insecure, prefer --password-stdin or SEALVAULT_PASSWORD)
    #[arg(long, env = "SEALVAULT_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Read the master password from stdin (first line)
    #[arg(long, conflicts_with = "password", global = true)]
    password_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Master password sources extracted from the CLI
#[derive(Clone, Default)]
pub struct PasswordOptions {
    pub password: Option<String>,
    pub password_stdin: bool,
}

impl From<&Cli> for PasswordOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            password: cli.password.clone(),
            password_stdin: cli.password_stdin,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    // ============ Entry commands (require unlock) ============
    /// Add a credential
    Add(add::Args),

    /// Show a credential
    Get(get::Args),

    /// Change fields of a credential
    Edit(edit::Args),

    /// Delete a credential
    Rm(rm::Args),

    /// List credentials
    Ls(ls::Args),

    /// Search titles, usernames, websites and notes
    Search(search::Args),

    /// List categories in use
    Categories(categories::Args),

    /// Show vault information
    Info(info::Args),

    /// Interactive session with idle auto-lock
    Shell(shell::Args),

    // ============ Standalone commands ============
    /// Create a new vault
    Init,

    /// Generate a random password
    Generate(generate::Args),

    /// Generate shell completions
    Completions(completions::Args),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            // Only print error if not quiet mode (quiet is parsed separately for this)
            let args: Vec<String> = std::env::args().collect();
            let is_quiet = args.iter().any(|a| a == "-q" || a == "--quiet");

            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let password_opts = PasswordOptions::from(&cli);

    match cli.command {
        // No config or vault needed
        Commands::Completions(args) => completions::execute(&args),
        command => dispatch(command, cli.vault_dir, &password_opts),
    }
}

fn dispatch(
    command: Commands,
    vault_dir: Option<PathBuf>,
    password_opts: &PasswordOptions,
) -> Result<()> {
    let config = Config::load()?;
    let layout = config::resolve_layout(vault_dir.as_deref(), &config)?;
    tracing::debug!(vault = %layout.dir().display(), "Resolved vault directory");

    match command {
        Commands::Init => {
            let password = get_new_master_password(password_opts)?;
            init::execute(&layout, &password)
        }
        Commands::Generate(args) => generate::execute(&args, &config.password_policy()),
        Commands::Shell(args) => shell::execute(&layout, &config, password_opts, &args),
        Commands::Completions(args) => completions::execute(&args),

        Commands::Add(args) => with_session(&layout, password_opts, |session| {
            add::execute(session, &args, &config.password_policy())
        }),
        Commands::Get(args) => with_session(&layout, password_opts, |s| get::execute(s, &args)),
        Commands::Edit(args) => with_session(&layout, password_opts, |session| {
            edit::execute(session, &args, &config.password_policy())
        }),
        Commands::Rm(args) => with_session(&layout, password_opts, |s| rm::execute(s, &args)),
        Commands::Ls(args) => with_session(&layout, password_opts, |s| ls::execute(s, &args)),
        Commands::Search(args) => {
            with_session(&layout, password_opts, |s| search::execute(s, &args))
        }
        Commands::Categories(args) => {
            with_session(&layout, password_opts, |s| categories::execute(s, &args))
        }
        Commands::Info(args) => with_session(&layout, password_opts, |s| info::execute(s, &args)),
    }
}

/// Unlock the vault for a single command, then lock it.
fn with_session<F>(layout: &VaultLayout, password_opts: &PasswordOptions, f: F) -> Result<()>
where
    F: FnOnce(&VaultSession) -> Result<()>,
{
    let session = unlock_vault(layout, password_opts, &SessionOptions::without_auto_lock())?;
    let result = f(&session);
    session.lock();
    result
}

/// Unlock the vault at `layout`
pub fn unlock_vault(
    layout: &VaultLayout,
    password_opts: &PasswordOptions,
    options: &SessionOptions,
) -> Result<VaultSession> {
    if !layout.is_initialized() {
        return Err(SessionError::VaultNotFound(layout.dir().to_path_buf()))
            .context("Run `sealvault init` to create a vault");
    }

    let password = get_master_password(password_opts)?;
    VaultSession::unlock(layout, &password, options).context("Failed to unlock vault")
}

/// Get the master password using the priority chain:
/// 1. --password-stdin
/// 2. --password / SEALVAULT_PASSWORD
/// 3. Interactive prompt
pub fn get_master_password(opts: &PasswordOptions) -> Result<String> {
    if opts.password_stdin {
        read_password_from_stdin()
    } else if let Some(ref password) = opts.password {
        Ok(password.clone())
    } else {
        auth::prompt_master_password()
    }
}

/// Same chain as [`get_master_password`], but an interactive prompt asks twice.
fn get_new_master_password(opts: &PasswordOptions) -> Result<String> {
    if opts.password_stdin || opts.password.is_some() {
        get_master_password(opts)
    } else {
        auth::prompt_new_master_password()
    }
}

/// Read password from stdin (first line only)
fn read_password_from_stdin() -> Result<String> {
    if io::stdin().is_terminal() {
        anyhow::bail!(
            "--password-stdin requires password to be piped in.\n\
             Example: echo \"$SECRET\" | sealvault --password-stdin ls"
        );
    }

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    let password = password.trim_end_matches('\n').trim_end_matches('\r');

    if password.is_empty() {
        anyhow::bail!("Password from stdin is empty");
    }

    Ok(password.to_string())
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(session_err) = cause.downcast_ref::<SessionError>() {
            match session_err {
                SessionError::AuthenticationFailed => return exit_code::AUTH_FAILED,
                SessionError::WeakPassword { .. } => return exit_code::WEAK_PASSWORD,
                SessionError::VaultNotFound(_)
                | SessionError::VaultAlreadyExists(_)
                | SessionError::KeyUnverifiable { .. }
                | SessionError::Salt(SaltError::InvalidLength { .. })
                | SessionError::Store(StoreError::UnsupportedVersion { .. }) => {
                    return exit_code::VAULT_INVALID;
                }
                _ => {}
            }
        }

        if let Some(lookup_err) = cause.downcast_ref::<LookupError>()
            && matches!(lookup_err, LookupError::NotFound(_))
        {
            return exit_code::NOT_FOUND;
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::PermissionDenied => return exit_code::PERMISSION_DENIED,
                io::ErrorKind::Interrupted => return exit_code::CANCELLED,
                _ => {}
            }
        }
    }

    exit_code::GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_categorize_session_errors() {
        let auth = anyhow::Error::new(SessionError::AuthenticationFailed).context("unlock");
        assert_eq!(categorize_error(&auth), exit_code::AUTH_FAILED);

        let weak = anyhow::Error::new(SessionError::WeakPassword { min_len: 8 });
        assert_eq!(categorize_error(&weak), exit_code::WEAK_PASSWORD);

        let missing = anyhow::Error::new(SessionError::VaultNotFound(PathBuf::from("/nope")));
        assert_eq!(categorize_error(&missing), exit_code::VAULT_INVALID);

        let damaged = anyhow::Error::new(SessionError::KeyUnverifiable {
            backup: PathBuf::from("/nope/passwords.json.corrupt-1"),
        });
        assert_eq!(categorize_error(&damaged), exit_code::VAULT_INVALID);
    }

    #[test]
    fn test_categorize_lookup_and_io_errors() {
        let not_found = anyhow::Error::new(LookupError::NotFound("abc".into()));
        assert_eq!(categorize_error(&not_found), exit_code::NOT_FOUND);

        let ambiguous = anyhow::Error::new(LookupError::Ambiguous {
            prefix: "a".into(),
            count: 2,
        });
        assert_eq!(categorize_error(&ambiguous), exit_code::GENERAL_ERROR);

        let denied = anyhow::Error::new(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(categorize_error(&denied), exit_code::PERMISSION_DENIED);
    }
}
