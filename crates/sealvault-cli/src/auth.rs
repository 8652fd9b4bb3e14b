use anyhow::{Result, bail};
use rpassword::read_password;
use std::io::{self, Write};

/// Prompt for the master password. Input is not echoed.
///
/// For non-interactive use, pass `--password-stdin` or set `SEALVAULT_PASSWORD`.
pub fn prompt_master_password() -> Result<String> {
    prompt_hidden("Master password: ")
}

/// Prompt twice for a new master password and require both to match.
pub fn prompt_new_master_password() -> Result<String> {
    let first = prompt_hidden("New master password: ")?;
    let second = prompt_hidden("Confirm master password: ")?;
    if first != second {
        bail!("Passwords do not match");
    }
    Ok(first)
}

/// Prompt for an entry's password.
pub fn prompt_entry_password() -> Result<String> {
    prompt_hidden("Entry password: ")
}

fn prompt_hidden(label: &str) -> Result<String> {
    eprint!("{label}");
    io::stderr().flush()?;

    let password = read_password()?;
    if password.is_empty() {
        bail!("Password cannot be empty");
    }
    Ok(password)
}
