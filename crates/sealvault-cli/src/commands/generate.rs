//! Generate command - print random passwords without touching the vault.
//!
//! # Examples
//!
//! ```bash
//! sealvault generate --length 32
//! sealvault generate --no-symbols --count 5 --strength
//! ```

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use sealvault_core::{PasswordPolicy, StrengthCategory, generate, strength_score};

#[allow(clippy::struct_excessive_bools)] // Command-line args naturally have multiple boolean flags
#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Password length (default: config `generator.length`, else 16)
    #[arg(short, long)]
    pub length: Option<usize>,

    /// Exclude lowercase letters
    #[arg(long)]
    pub no_lowercase: bool,

    /// Exclude uppercase letters
    #[arg(long)]
    pub no_uppercase: bool,

    /// Exclude digits
    #[arg(long)]
    pub no_digits: bool,

    /// Exclude symbols
    #[arg(long)]
    pub no_symbols: bool,

    /// How many passwords to print
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Append the strength score and category
    #[arg(short, long)]
    pub strength: bool,
}

#[instrument(level = "info", name = "cmd::generate", skip_all)]
pub fn execute(args: &Args, defaults: &PasswordPolicy) -> Result<()> {
    let policy = PasswordPolicy {
        length: args.length.unwrap_or(defaults.length),
        lowercase: defaults.lowercase && !args.no_lowercase,
        uppercase: defaults.uppercase && !args.no_uppercase,
        digits: defaults.digits && !args.no_digits,
        symbols: defaults.symbols && !args.no_symbols,
    };

    for _ in 0..args.count {
        let password = generate(&policy)?;
        if args.strength {
            let score = strength_score(&password);
            println!("{password}\t{score}\t{}", StrengthCategory::from_score(score));
        } else {
            println!("{password}");
        }
    }

    Ok(())
}
