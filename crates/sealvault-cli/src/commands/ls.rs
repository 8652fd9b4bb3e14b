//! List command - list credentials.
//!
//! # Examples
//!
//! ```bash
//! # Everything, as a table
//! sealvault ls
//!
//! # Only two categories, as JSON
//! sealvault ls -c Work -c Banking --json | jq '.[].title'
//! ```

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use sealvault_core::vault::VaultSession;

use super::category_filter;
use crate::output::{entries_json, entries_table};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Only entries in this category (repeatable)
    #[arg(short, long = "category", value_name = "CATEGORY")]
    pub categories: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// One id per line (script-friendly)
    #[arg(short = '1')]
    pub ids_only: bool,
}

#[instrument(level = "info", name = "cmd::ls", skip_all)]
pub fn execute(session: &VaultSession, args: &Args) -> Result<()> {
    let entries = match category_filter(&args.categories) {
        Some(categories) => session.search("", Some(&categories))?,
        None => session.list_all(false)?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries_json(&entries))?);
    } else if args.ids_only {
        for entry in &entries {
            println!("{}", entry.id);
        }
    } else if entries.is_empty() {
        eprintln!("No entries");
    } else {
        println!("{}", entries_table(&entries));
    }

    Ok(())
}
