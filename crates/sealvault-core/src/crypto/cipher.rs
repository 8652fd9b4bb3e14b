//! Authenticated encryption of individual secrets.
//!
//! Each secret is sealed with AES-256-GCM under the session's derived key and a
//! fresh random nonce. The resulting token is self-contained text suitable for a
//! JSON string field:
//!
//! ```text
//! base64url( version:1 || nonce:12 || ciphertext || tag:16 )
//! ```

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use thiserror::Error;
use tracing::trace;
use zeroize::{Zeroize, Zeroizing};

use super::kdf::DerivedKey;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Version byte prefixed to every sealed token.
pub const TOKEN_VERSION: u8 = 1;

const HEADER_LEN: usize = 1 + NONCE_LEN;

/// A sealed secret could not be opened.
///
/// Every variant means the same thing to callers: the plaintext is not
/// available. The distinction exists for logs only.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptFailure {
    /// Not valid base64, or too short to hold a nonce and tag.
    #[error("sealed token is malformed")]
    Malformed,

    #[error("unsupported sealed token version {0}")]
    UnsupportedVersion(u8),

    /// Tag check failed: wrong key or tampered ciphertext.
    #[error("authentication failed - wrong key or tampered ciphertext")]
    Authentication,

    #[error("decrypted secret is not valid UTF-8")]
    InvalidUtf8,
}

/// Sealing failed. AES-GCM only refuses plaintexts beyond its 64 GiB limit.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("plaintext of {len} bytes cannot be sealed")]
pub struct SealError {
    pub len: usize,
}

/// Seals and opens secret strings under one derived key.
///
/// Built once per unlocked session; dropping it drops (and zeroes) the key.
#[derive(Debug)]
pub struct CipherBox {
    key: DerivedKey,
}

impl CipherBox {
    pub fn new(key: DerivedKey) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext` into a randomized, self-contained token.
    ///
    /// Sealing the same plaintext twice yields different tokens.
    pub fn seal(&self, plaintext: &str) -> Result<String, SealError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .key
            .with_bytes(|key_bytes| {
                let key: &Key<Aes256Gcm> = key_bytes.into();
                Aes256Gcm::new(key).encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            })
            .map_err(|_| SealError {
                len: plaintext.len(),
            })?;

        let mut token = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        token.push(TOKEN_VERSION);
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&ciphertext);

        trace!(plaintext_len = plaintext.len(), "Sealed secret");
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    /// Authenticate and decrypt a token produced by [`CipherBox::seal`].
    ///
    /// Never returns unauthenticated bytes: any malformation, key mismatch or
    /// tampering is a [`DecryptFailure`].
    pub fn open(&self, token: &str) -> Result<Zeroizing<String>, DecryptFailure> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| DecryptFailure::Malformed)?;

        if raw.len() < HEADER_LEN + TAG_LEN {
            return Err(DecryptFailure::Malformed);
        }
        if raw[0] != TOKEN_VERSION {
            return Err(DecryptFailure::UnsupportedVersion(raw[0]));
        }

        let (nonce, ciphertext) = raw[1..].split_at(NONCE_LEN);
        let plaintext = self
            .key
            .with_bytes(|key_bytes| {
                let key: &Key<Aes256Gcm> = key_bytes.into();
                Aes256Gcm::new(key).decrypt(Nonce::from_slice(nonce), ciphertext)
            })
            .map_err(|_| DecryptFailure::Authentication)?;

        String::from_utf8(plaintext).map(Zeroizing::new).map_err(|e| {
            let mut bytes = e.into_bytes();
            bytes.zeroize();
            DecryptFailure::InvalidUtf8
        })
    }
}
