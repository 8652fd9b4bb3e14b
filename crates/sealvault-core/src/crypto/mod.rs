//! Cryptographic primitives for the credential vault.
//!
//! - [`kdf`]: master password + installation salt → 256-bit key
//! - [`cipher`]: AES-256-GCM sealing of individual secret strings

pub mod cipher;
pub mod kdf;

pub use cipher::{CipherBox, DecryptFailure, SealError};
pub use kdf::{
    DerivedKey, KEY_LEN, PBKDF2_ITERATIONS, SALT_LEN, Salt, SaltError, derive_key, load_or_create_salt,
    load_salt, salt_exists,
};
