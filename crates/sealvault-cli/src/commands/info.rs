//! Info command - show vault location, format and contents summary.
//!
//! # Examples
//!
//! ```bash
//! sealvault info
//! sealvault info --json
//! ```

use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use sealvault_core::crypto::PBKDF2_ITERATIONS;
use sealvault_core::vault::VaultSession;

use crate::output::create_table;

const CIPHER: &str = "AES-256-GCM";

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output format for info command
#[derive(Serialize)]
struct VaultInfo {
    vault_path: String,
    salt_file: String,
    entries_file: String,
    format_version: u32,
    entries: usize,
    categories: usize,
    kdf: String,
    cipher: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    recovered_from: Option<String>,
}

#[instrument(level = "info", name = "cmd::info", skip_all)]
pub fn execute(session: &VaultSession, args: &Args) -> Result<()> {
    let layout = session.layout();
    let info = session.with_store(|store| VaultInfo {
        vault_path: layout.dir().display().to_string(),
        salt_file: layout.salt_path().display().to_string(),
        entries_file: store.path().display().to_string(),
        format_version: store.format_version(),
        entries: store.len(),
        categories: store.list_categories().len(),
        kdf: format!("PBKDF2-HMAC-SHA256 ({PBKDF2_ITERATIONS} iterations)"),
        cipher: CIPHER,
        recovered_from: store.recovered_from().map(|p| p.display().to_string()),
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        let mut table = create_table();
        table.set_header(vec!["Property", "Value"]);
        table.add_row(vec!["Vault Path", info.vault_path.as_str()]);
        table.add_row(vec!["Salt File", info.salt_file.as_str()]);
        table.add_row(vec!["Entries File", info.entries_file.as_str()]);
        table.add_row(vec!["Format".to_string(), info.format_version.to_string()]);
        table.add_row(vec!["Entries".to_string(), info.entries.to_string()]);
        table.add_row(vec!["Categories".to_string(), info.categories.to_string()]);
        table.add_row(vec!["Key Derivation", info.kdf.as_str()]);
        table.add_row(vec!["Cipher", info.cipher]);
        if let Some(backup) = &info.recovered_from {
            table.add_row(vec!["Recovered From", backup.as_str()]);
        }
        println!("{table}");
    }

    Ok(())
}
