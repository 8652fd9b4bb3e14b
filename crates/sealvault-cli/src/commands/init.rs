use anyhow::{Context, Result};
use tracing::instrument;

use sealvault_core::vault::{SessionOptions, VaultLayout, VaultSession};

#[instrument(level = "info", name = "cmd::init", skip_all, fields(vault = %layout.dir().display()))]
pub fn execute(layout: &VaultLayout, password: &str) -> Result<()> {
    let session = VaultSession::create_vault(layout, password, &SessionOptions::without_auto_lock())
        .context("Failed to create vault")?;
    session.lock();

    println!("Created new vault at: {}", layout.dir().display());
    Ok(())
}
