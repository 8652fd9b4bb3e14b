//! Exit codes for the CLI.
//!
//! These follow common Unix conventions and provide meaningful
//! status information for scripting and automation.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Authentication failed (wrong master password)
pub const AUTH_FAILED: u8 = 3;

/// Vault not found, already exists, or invalid
pub const VAULT_INVALID: u8 = 4;

/// Permission denied on the vault directory
pub const PERMISSION_DENIED: u8 = 5;

/// Entry not found (no id matches)
pub const NOT_FOUND: u8 = 7;

/// Operation cancelled or interrupted
pub const CANCELLED: u8 = 8;

/// Master password rejected by the length policy
pub const WEAK_PASSWORD: u8 = 9;
