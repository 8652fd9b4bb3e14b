//! Vault-level abstractions: entries, the persisted store and the session

pub mod entry;
pub mod layout;
pub mod session;
pub mod store;
pub mod timer;

// Re-export commonly used types
pub use entry::{CredentialEntry, EntryUpdate, EntryView, NewEntry, PasswordField};
pub use layout::{CANARY_FILE, ENTRIES_FILE, SALT_FILE, VaultLayout};
pub use session::{
    DEFAULT_AUTO_LOCK, MIN_MASTER_PASSWORD_LEN, SessionError, SessionOptions, VaultSession,
};
pub use store::{FORMAT_VERSION, StoreError, VaultStore};
pub use timer::IdleTimer;
