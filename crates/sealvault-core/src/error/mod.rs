//! Error types for the vault engine
//!
//! Every fallible public operation returns one of these. Per-secret decryption
//! failures never escape the store; they surface as
//! [`PasswordField::Unavailable`](crate::vault::PasswordField::Unavailable).

// Re-export error types from submodules
pub use crate::crypto::{DecryptFailure, SaltError, SealError};
pub use crate::generator::GeneratorError;
pub use crate::vault::session::SessionError;
pub use crate::vault::store::StoreError;
