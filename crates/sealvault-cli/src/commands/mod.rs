pub mod add;
pub mod categories;
pub mod completions;
pub mod edit;
pub mod generate;
pub mod get;
pub mod info;
pub mod init;
pub mod ls;
pub mod rm;
pub mod search;
pub mod shell;

use std::collections::BTreeSet;

use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use thiserror::Error;
use uuid::Uuid;

use sealvault_core::vault::VaultSession;
use sealvault_core::{PasswordPolicy, StrengthCategory, generate as generate_password};

use crate::auth;

/// Entry id lookup failed.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("No entry matches id '{0}'")]
    NotFound(String),

    #[error("Id prefix '{prefix}' matches {count} entries; use more characters")]
    Ambiguous { prefix: String, count: usize },
}

/// Resolve a full id or any unique prefix of one.
pub fn resolve_id(session: &VaultSession, prefix: &str) -> Result<Uuid> {
    let needle = prefix.trim().to_lowercase();
    if let Ok(id) = Uuid::parse_str(&needle) {
        return Ok(id);
    }
    if needle.is_empty() {
        return Err(LookupError::NotFound(prefix.to_string()).into());
    }

    let matches: Vec<Uuid> = session.with_store(|store| {
        store
            .entries()
            .iter()
            .map(|entry| entry.id)
            .filter(|id| {
                id.hyphenated().to_string().starts_with(&needle)
                    || id.simple().to_string().starts_with(&needle)
            })
            .collect()
    })?;

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(LookupError::NotFound(prefix.to_string()).into()),
        many => Err(LookupError::Ambiguous {
            prefix: prefix.to_string(),
            count: many.len(),
        }
        .into()),
    }
}

/// Category filter from repeated `--category` flags. Empty means no filter.
pub fn category_filter(categories: &[String]) -> Option<BTreeSet<String>> {
    if categories.is_empty() {
        None
    } else {
        Some(categories.iter().cloned().collect())
    }
}

/// Where an entry's password comes from
#[derive(ClapArgs, Clone, Default)]
pub struct SecretArgs {
    /// Entry password (insecure: visible in process list and shell history)
    #[arg(long, value_name = "PASSWORD", conflicts_with = "generate")]
    pub secret: Option<String>,

    /// Generate a random password instead
    #[arg(short, long)]
    pub generate: bool,

    /// Length of the generated password
    #[arg(long, requires = "generate")]
    pub length: Option<usize>,
}

impl SecretArgs {
    /// The password given on the command line or generated, if either was asked for.
    pub fn provided(&self, policy: &PasswordPolicy) -> Result<Option<String>> {
        if let Some(secret) = &self.secret {
            if secret.is_empty() {
                bail!("Password cannot be empty");
            }
            return Ok(Some(secret.clone()));
        }
        if !self.generate {
            return Ok(None);
        }

        let policy = PasswordPolicy {
            length: self.length.unwrap_or(policy.length),
            ..*policy
        };
        let password = generate_password(&policy)?;
        eprintln!(
            "Generated a {}-character password ({})",
            password.len(),
            StrengthCategory::of(&password)
        );
        Ok(Some(password))
    }

    /// Like [`provided`](Self::provided), falling back to an interactive prompt.
    pub fn required(&self, policy: &PasswordPolicy) -> Result<String> {
        match self.provided(policy)? {
            Some(password) => Ok(password),
            None => auth::prompt_entry_password(),
        }
    }
}
