use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use sealvault_core::vault::VaultSession;

use super::{LookupError, resolve_id};

#[derive(ClapArgs)]
pub struct Args {
    /// Entry id or unique id prefix
    pub id: String,

    /// Succeed even if no entry matches
    #[arg(short, long)]
    pub force: bool,
}

#[instrument(level = "info", name = "cmd::rm", skip_all, fields(id = %args.id))]
pub fn execute(session: &VaultSession, args: &Args) -> Result<()> {
    let id = match resolve_id(session, &args.id) {
        Ok(id) => id,
        Err(e) if args.force && matches!(e.downcast_ref::<LookupError>(), Some(LookupError::NotFound(_))) => {
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let deleted = session.delete_entry(id).context("Failed to delete entry")?;
    if !deleted && !args.force {
        return Err(LookupError::NotFound(args.id.clone()).into());
    }
    if deleted {
        eprintln!("Deleted {id}");
    }
    Ok(())
}
