//! Add command - store a new credential.
//!
//! # Examples
//!
//! ```bash
//! # Prompt for the entry password
//! sealvault add "Email" -u me@example.com -w https://mail.example.com
//!
//! # Generate one and file it under a category
//! sealvault add GitHub -u octocat -c Work --generate --length 24
//! ```

use anyhow::{Context, Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use sealvault_core::PasswordPolicy;
use sealvault_core::vault::{NewEntry, VaultSession};

use super::SecretArgs;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Title of the entry
    pub title: String,

    /// Username or login
    #[arg(short, long, default_value = "")]
    pub username: String,

    /// Website or URL
    #[arg(short, long, default_value = "")]
    pub website: String,

    /// Category
    #[arg(short, long, default_value = "")]
    pub category: String,

    /// Free-form notes
    #[arg(short, long, default_value = "")]
    pub notes: String,

    #[command(flatten)]
    pub secret: SecretArgs,
}

#[instrument(level = "info", name = "cmd::add", skip_all)]
pub fn execute(session: &VaultSession, args: &Args, policy: &PasswordPolicy) -> Result<()> {
    let title = args.title.trim();
    if title.is_empty() {
        bail!("Title is required");
    }
    let password = args.secret.required(policy)?;

    let entry = NewEntry::new(title, args.username.trim(), password)
        .website(args.website.trim())
        .category(args.category.trim())
        .notes(args.notes.trim());

    let id = session.add_entry(entry).context("Failed to add entry")?;
    println!("{id}");
    Ok(())
}
