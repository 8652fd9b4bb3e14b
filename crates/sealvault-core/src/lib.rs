//! Encrypted credential vault engine.
//!
//! A master password and a per-installation salt derive the vault key
//! ([`crypto::derive_key`]). Each stored password is sealed individually with
//! AES-256-GCM ([`crypto::CipherBox`]). The entry store ([`vault::VaultStore`])
//! persists metadata in plaintext and passwords only as sealed tokens.
//! [`vault::VaultSession`] is the only way to reach an unlocked store.
//!
//! ```no_run
//! use sealvault_core::vault::{NewEntry, SessionOptions, VaultLayout, VaultSession};
//!
//! # fn main() -> Result<(), sealvault_core::error::SessionError> {
//! let layout = VaultLayout::new("/tmp/my-vault");
//! let session = VaultSession::create_vault(&layout, "correcthorsebattery", &SessionOptions::default())?;
//! let id = session.add_entry(NewEntry::new("Email", "me@x.com", "hunter2"))?;
//! session.lock();
//!
//! let session = VaultSession::unlock(&layout, "correcthorsebattery", &SessionOptions::default())?;
//! let entry = session.get_entry(id)?.expect("entry exists");
//! assert_eq!(entry.password.revealed(), Some("hunter2"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod crypto;
pub mod error;
pub mod generator;
pub mod vault;

mod fs;

pub use generator::{PasswordPolicy, StrengthCategory, generate, strength_score};
pub use vault::{
    EntryUpdate, EntryView, NewEntry, PasswordField, SessionOptions, VaultLayout, VaultSession,
};
