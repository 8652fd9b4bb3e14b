use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use sealvault_core::vault::VaultSession;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::categories", skip_all)]
pub fn execute(session: &VaultSession, args: &Args) -> Result<()> {
    let categories = session.list_categories()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&categories)?);
    } else {
        for category in &categories {
            println!("{category}");
        }
    }

    Ok(())
}
