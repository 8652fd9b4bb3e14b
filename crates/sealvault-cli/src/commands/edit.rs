use anyhow::{Context, Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use sealvault_core::PasswordPolicy;
use sealvault_core::vault::{EntryUpdate, VaultSession};

use super::{LookupError, SecretArgs, resolve_id};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Entry id or unique id prefix
    pub id: String,

    /// New title
    #[arg(short, long)]
    pub title: Option<String>,

    /// New username
    #[arg(short, long)]
    pub username: Option<String>,

    /// New website
    #[arg(short, long)]
    pub website: Option<String>,

    /// New category (empty string clears it)
    #[arg(short, long)]
    pub category: Option<String>,

    /// New notes
    #[arg(short, long)]
    pub notes: Option<String>,

    #[command(flatten)]
    pub secret: SecretArgs,
}

#[instrument(level = "info", name = "cmd::edit", skip_all, fields(id = %args.id))]
pub fn execute(session: &VaultSession, args: &Args, policy: &PasswordPolicy) -> Result<()> {
    let id = resolve_id(session, &args.id)?;

    let title = trimmed(args.title.as_deref());
    if title.as_deref() == Some("") {
        bail!("Title is required");
    }

    let mut update = EntryUpdate {
        title,
        username: trimmed(args.username.as_deref()),
        website: trimmed(args.website.as_deref()),
        category: trimmed(args.category.as_deref()),
        notes: trimmed(args.notes.as_deref()),
        ..EntryUpdate::default()
    };
    if let Some(password) = args.secret.provided(policy)? {
        update = update.password(password);
    }
    if update.is_empty() {
        bail!("Nothing to change; pass at least one field to update");
    }

    if !session.update_entry(id, update).context("Failed to update entry")? {
        return Err(LookupError::NotFound(args.id.clone()).into());
    }
    eprintln!("Updated {id}");
    Ok(())
}

fn trimmed(field: Option<&str>) -> Option<String> {
    field.map(|value| value.trim().to_string())
}
