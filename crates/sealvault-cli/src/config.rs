//! Configuration file support for the sealvault CLI.
//!
//! Configuration is stored at `~/.config/sealvault/config.toml` (XDG standard)
//! or the platform equivalent. `SEALVAULT_CONFIG_DIR` overrides the directory.
//!
//! # Example configuration
//!
//! ```toml
//! [vault]
//! path = "/home/user/.local/share/sealvault"
//!
//! [session]
//! auto_lock_secs = 300   # 0 disables auto-lock in `sealvault shell`
//!
//! [generator]
//! length = 20
//! symbols = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use sealvault_core::vault::{SessionOptions, VaultLayout};
use sealvault_core::PasswordPolicy;

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "SEALVAULT_CONFIG_DIR";

/// Main configuration structure
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub vault: VaultSection,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub generator: GeneratorSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct VaultSection {
    /// Vault directory, used when neither `--vault-dir` nor `SEALVAULT_DIR` is set
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SessionSection {
    /// Idle seconds before the interactive shell locks; 0 disables
    pub auto_lock_secs: Option<u64>,
}

/// Defaults for `generate`, `add --generate` and `edit --generate`
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneratorSection {
    pub length: Option<usize>,
    pub lowercase: Option<bool>,
    pub uppercase: Option<bool>,
    pub digits: Option<bool>,
    pub symbols: Option<bool>,
}

impl Config {
    /// Load configuration from the default path, or return empty config if not found.
    pub fn load() -> Result<Self> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Config::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Session options for long-lived sessions (the interactive shell).
    pub fn session_options(&self) -> SessionOptions {
        match self.session.auto_lock_secs {
            Some(0) => SessionOptions::without_auto_lock(),
            Some(secs) => SessionOptions {
                auto_lock: Some(Duration::from_secs(secs)),
            },
            None => SessionOptions::default(),
        }
    }

    /// Generator policy with configured overrides applied.
    pub fn password_policy(&self) -> PasswordPolicy {
        let defaults = PasswordPolicy::default();
        let generator = &self.generator;
        PasswordPolicy {
            length: generator.length.unwrap_or(defaults.length),
            lowercase: generator.lowercase.unwrap_or(defaults.lowercase),
            uppercase: generator.uppercase.unwrap_or(defaults.uppercase),
            digits: generator.digits.unwrap_or(defaults.digits),
            symbols: generator.symbols.unwrap_or(defaults.symbols),
        }
    }
}

/// Get the path to the configuration file.
pub fn config_path() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir).join("config.toml"));
    }

    let dirs = ProjectDirs::from("", "", "sealvault")
        .ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(dirs.config_dir().join("config.toml"))
}

/// Pick the vault directory.
///
/// `explicit` is `--vault-dir` (clap already folds in `SEALVAULT_DIR`), then
/// the config file, then the platform data directory.
pub fn resolve_layout(explicit: Option<&Path>, config: &Config) -> Result<VaultLayout> {
    if let Some(dir) = explicit {
        return Ok(VaultLayout::new(dir));
    }
    if let Some(dir) = &config.vault.path {
        return Ok(VaultLayout::new(dir));
    }
    VaultLayout::default_location().ok_or_else(|| {
        anyhow!("Could not determine a vault directory; pass --vault-dir or set SEALVAULT_DIR")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.vault.path.is_none());
        assert_eq!(config.session_options(), SessionOptions::default());
        assert_eq!(config.password_policy(), PasswordPolicy::default());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [vault]
            path = "/home/user/secrets"

            [session]
            auto_lock_secs = 60

            [generator]
            length = 24
            symbols = false
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.vault.path, Some(PathBuf::from("/home/user/secrets")));
        assert_eq!(
            config.session_options().auto_lock,
            Some(Duration::from_secs(60))
        );

        let policy = config.password_policy();
        assert_eq!(policy.length, 24);
        assert!(!policy.symbols);
        assert!(policy.digits);
    }

    #[test]
    fn test_zero_disables_auto_lock() {
        let config: Config = toml::from_str("[session]\nauto_lock_secs = 0").unwrap();
        assert_eq!(config.session_options().auto_lock, None);
    }

    #[test]
    fn test_resolve_layout_precedence() {
        let config: Config = toml::from_str("[vault]\npath = \"/from/config\"").unwrap();

        let explicit = resolve_layout(Some(Path::new("/from/flag")), &config).unwrap();
        assert_eq!(explicit.dir(), Path::new("/from/flag"));

        let configured = resolve_layout(None, &config).unwrap();
        assert_eq!(configured.dir(), Path::new("/from/config"));
    }
}
