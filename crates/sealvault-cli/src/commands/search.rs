use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use sealvault_core::vault::VaultSession;

use super::category_filter;
use crate::output::{entries_json, entries_table};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Text to look for (case-insensitive; passwords are never searched)
    pub query: String,

    /// Restrict to this category (repeatable)
    #[arg(short, long = "category", value_name = "CATEGORY")]
    pub categories: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::search", skip_all)]
pub fn execute(session: &VaultSession, args: &Args) -> Result<()> {
    let categories = category_filter(&args.categories);
    let hits = session.search(&args.query, categories.as_ref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries_json(&hits))?);
    } else if hits.is_empty() {
        eprintln!("No matches for '{}'", args.query);
    } else {
        println!("{}", entries_table(&hits));
    }

    Ok(())
}
