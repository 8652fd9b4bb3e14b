//! Master password key derivation.
//!
//! The vault key is PBKDF2-HMAC-SHA256 over the NFC-normalised master password
//! and a per-installation salt. The salt is created once, stored as 16 raw
//! bytes, and never rotated: every sealed secret in the store depends on it.

use std::fmt;
use std::fs;
use std::io;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use rand::RngCore;
use ring::pbkdf2;
use secrecy::{ExposeSecret, SecretBox};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

use crate::fs::{ensure_private_dir, write_new_private_file};

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count for the master password.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

const PBKDF2_ROUNDS: NonZeroU32 = match NonZeroU32::new(PBKDF2_ITERATIONS) {
    Some(rounds) => rounds,
    None => panic!("PBKDF2 iteration count must be non-zero"),
};

/// Errors reading or creating the installation salt.
#[derive(Error, Debug)]
pub enum SaltError {
    #[error("IO error accessing salt file {}: {source}", .path.display())]
    Io {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// The salt file exists but is not exactly [`SALT_LEN`] bytes.
    ///
    /// The file is never replaced in this case: a new salt would make every
    /// stored secret undecryptable.
    #[error("Salt file {} is {actual} bytes, expected {SALT_LEN}", .path.display())]
    InvalidLength { path: PathBuf, actual: usize },
}

impl SaltError {
    fn io(source: io::Error, path: &Path) -> Self {
        SaltError::Io {
            source,
            path: path.to_path_buf(),
        }
    }
}

/// Random value mixed into key derivation. Persisted, not secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    pub fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh salt from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

/// 256-bit key derived from the master password.
///
/// Lives only in memory and is zeroed on drop. `Debug` is redacted and
/// equality is constant-time.
pub struct DerivedKey(SecretBox<[u8; KEY_LEN]>);

impl DerivedKey {
    /// Scoped access to the raw key bytes.
    pub(crate) fn with_bytes<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; KEY_LEN]) -> R,
    {
        f(self.0.expose_secret())
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        self.0
            .expose_secret()
            .as_slice()
            .ct_eq(other.0.expose_secret().as_slice())
            .into()
    }
}

impl Eq for DerivedKey {}

/// Derive the vault key from a master password and the installation salt.
///
/// Deterministic: the same password and salt always give the same key. An
/// empty password is accepted here; password policy lives in the session.
#[instrument(level = "debug", skip_all)]
pub fn derive_key(password: &str, salt: &Salt) -> DerivedKey {
    let start = std::time::Instant::now();
    let key = derive_key_with_rounds(password, salt.as_bytes(), PBKDF2_ROUNDS);
    debug!(elapsed = ?start.elapsed(), iterations = PBKDF2_ITERATIONS, "Derived vault key");
    key
}

fn derive_key_with_rounds(password: &str, salt: &[u8], rounds: NonZeroU32) -> DerivedKey {
    let normalized = Zeroizing::new(password.nfc().collect::<String>());
    let mut key = Box::new([0u8; KEY_LEN]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        rounds,
        salt,
        normalized.as_bytes(),
        key.as_mut_slice(),
    );
    DerivedKey(SecretBox::new(key))
}

/// Whether an installation salt exists at `path`.
///
/// This is the "vault initialised" fact hosts use to choose between the
/// first-run and the unlock flow.
pub fn salt_exists(path: &Path) -> bool {
    path.is_file()
}

/// Read an existing salt.
pub fn load_salt(path: &Path) -> Result<Salt, SaltError> {
    let bytes = fs::read(path).map_err(|e| SaltError::io(e, path))?;
    parse_salt(&bytes, path)
}

/// Read the salt at `path`, creating and persisting a new one if absent.
///
/// Creates the containing directory on first call. Once a salt exists it is
/// returned unchanged on every later call.
#[instrument(level = "debug", fields(path = %path.display()))]
pub fn load_or_create_salt(path: &Path) -> Result<Salt, SaltError> {
    match fs::read(path) {
        Ok(bytes) => parse_salt(&bytes, path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => create_salt(path),
        Err(e) => Err(SaltError::io(e, path)),
    }
}

fn create_salt(path: &Path) -> Result<Salt, SaltError> {
    if let Some(dir) = path.parent() {
        ensure_private_dir(dir).map_err(|e| SaltError::io(e, path))?;
    }

    let salt = Salt::random();
    match write_new_private_file(path, salt.as_bytes()) {
        Ok(()) => {
            info!(path = %path.display(), "Created installation salt");
            Ok(salt)
        }
        // Another process won the race; theirs is the salt of record.
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => load_salt(path),
        Err(e) => Err(SaltError::io(e, path)),
    }
}

fn parse_salt(bytes: &[u8], path: &Path) -> Result<Salt, SaltError> {
    let array: [u8; SALT_LEN] = bytes.try_into().map_err(|_| {
        warn!(path = %path.display(), actual = bytes.len(), "Salt file has wrong length");
        SaltError::InvalidLength {
            path: path.to_path_buf(),
            actual: bytes.len(),
        }
    })?;
    Ok(Salt(array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use tempfile::TempDir;

    #[test]
    fn test_pbkdf2_known_answer() {
        // PBKDF2-HMAC-SHA256, P="password", S="salt", c=1, dkLen=32
        let key = derive_key_with_rounds("password", b"salt", NonZeroU32::MIN);
        key.with_bytes(|bytes| {
            assert_eq!(
                bytes,
                &hex!("120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b")
            );
        });
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = Salt::from_bytes([7u8; SALT_LEN]);
        assert_eq!(derive_key("correcthorsebattery", &salt), derive_key("correcthorsebattery", &salt));
    }

    #[test]
    fn test_derive_key_depends_on_password_and_salt() {
        let salt = Salt::from_bytes([7u8; SALT_LEN]);
        let other_salt = Salt::from_bytes([8u8; SALT_LEN]);

        let key = derive_key("password-one", &salt);
        assert_ne!(key, derive_key("password-two", &salt));
        assert_ne!(key, derive_key("password-one", &other_salt));
    }

    #[test]
    fn test_derive_key_accepts_empty_password() {
        let salt = Salt::from_bytes([1u8; SALT_LEN]);
        assert_eq!(derive_key("", &salt), derive_key("", &salt));
    }

    #[test]
    fn test_nfc_normalization() {
        // "é" precomposed vs "e" + combining acute accent
        let salt = Salt::from_bytes([3u8; SALT_LEN]);
        assert_eq!(derive_key("caf\u{e9}", &salt), derive_key("cafe\u{301}", &salt));
    }

    #[test]
    fn test_derived_key_debug_is_redacted() {
        let key = derive_key_with_rounds("hunter2", b"salt", NonZeroU32::MIN);
        assert_eq!(format!("{key:?}"), "DerivedKey([REDACTED])");
    }

    #[test]
    fn test_load_or_create_salt_creates_once() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vault").join("salt");
        assert!(!salt_exists(&path));

        let first = load_or_create_salt(&path).unwrap();
        assert!(salt_exists(&path));
        assert_eq!(fs::read(&path).unwrap(), first.as_bytes());

        let second = load_or_create_salt(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_salt_wrong_length_is_rejected_not_replaced() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("salt");
        fs::write(&path, b"short").unwrap();

        let err = load_or_create_salt(&path).unwrap_err();
        assert!(matches!(err, SaltError::InvalidLength { actual: 5, .. }));
        assert_eq!(fs::read(&path).unwrap(), b"short");
    }

    #[test]
    fn test_load_salt_missing() {
        let temp = TempDir::new().unwrap();
        let err = load_salt(&temp.path().join("salt")).unwrap_err();
        assert!(matches!(err, SaltError::Io { ref source, .. } if source.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn test_random_salts_differ() {
        assert_ne!(Salt::random(), Salt::random());
    }
}
