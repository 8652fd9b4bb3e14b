//! Get command - show one credential.
//!
//! # Examples
//!
//! ```bash
//! # Details with the password masked
//! sealvault get 3f2a9c
//!
//! # Just the password, for piping
//! sealvault get 3f2a9c --password-only | pbcopy
//! ```

use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use sealvault_core::vault::VaultSession;

use super::{LookupError, resolve_id};
use crate::output::{EntryJson, create_table, format_password, format_timestamp};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Entry id or unique id prefix
    pub id: String,

    /// Show the password instead of masking it
    #[arg(short, long)]
    pub show: bool,

    /// Print only the password
    #[arg(short, long, conflicts_with = "json")]
    pub password_only: bool,

    /// Output as JSON (includes the password with --show)
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::get", skip_all, fields(id = %args.id))]
pub fn execute(session: &VaultSession, args: &Args) -> Result<()> {
    let id = resolve_id(session, &args.id)?;
    let Some(entry) = session.get_entry(id)? else {
        return Err(LookupError::NotFound(args.id.clone()).into());
    };

    if args.password_only {
        match entry.password.revealed() {
            Some(password) => println!("{password}"),
            None => bail!("Password of '{}' could not be decrypted", entry.title),
        }
        return Ok(());
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&EntryJson::new(&entry, args.show))?
        );
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["ID".to_string(), entry.id.to_string()]);
    table.add_row(vec!["Title".to_string(), entry.title.clone()]);
    table.add_row(vec!["Username".to_string(), entry.username.clone()]);
    table.add_row(vec![
        "Password".to_string(),
        format_password(&entry.password, args.show),
    ]);
    table.add_row(vec!["Website".to_string(), entry.website.clone()]);
    table.add_row(vec!["Category".to_string(), entry.category.clone()]);
    table.add_row(vec!["Notes".to_string(), entry.notes.clone()]);
    table.add_row(vec!["Created".to_string(), format_timestamp(entry.created_at)]);
    table.add_row(vec!["Modified".to_string(), format_timestamp(entry.modified_at)]);
    println!("{table}");

    Ok(())
}
