//! On-disk layout of a vault directory.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::crypto::salt_exists;

/// Installation salt: 16 raw bytes, no header.
pub const SALT_FILE: &str = "salt";

/// Entry store: pretty-printed JSON.
pub const ENTRIES_FILE: &str = "passwords.json";

/// Key canary: one sealed token, written once at vault creation.
pub const CANARY_FILE: &str = "canary";

/// Paths of the files that make up one vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultLayout {
    dir: PathBuf,
}

impl VaultLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Per-user default: the platform data directory for `sealvault`
    /// (`~/.local/share/sealvault` on Linux).
    ///
    /// Returns `None` when no home directory can be determined.
    pub fn default_location() -> Option<Self> {
        ProjectDirs::from("", "", "sealvault").map(|dirs| Self::new(dirs.data_dir()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn salt_path(&self) -> PathBuf {
        self.dir.join(SALT_FILE)
    }

    pub fn entries_path(&self) -> PathBuf {
        self.dir.join(ENTRIES_FILE)
    }

    pub fn canary_path(&self) -> PathBuf {
        self.dir.join(CANARY_FILE)
    }

    /// Whether the installation salt exists, i.e. a vault was set up here.
    pub fn is_initialized(&self) -> bool {
        salt_exists(&self.salt_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = VaultLayout::new("/tmp/vault");
        assert_eq!(layout.salt_path(), Path::new("/tmp/vault/salt"));
        assert_eq!(layout.entries_path(), Path::new("/tmp/vault/passwords.json"));
        assert_eq!(layout.canary_path(), Path::new("/tmp/vault/canary"));
    }

    #[test]
    fn test_uninitialized() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(!VaultLayout::new(temp.path()).is_initialized());
    }
}
