//! Random password generation and a simple strength score.

use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
/// Symbols drawn from when [`PasswordPolicy::symbols`] is enabled.
pub const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{}|;:,.<>?/~";

/// Default generated password length.
pub const DEFAULT_LENGTH: usize = 16;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("At least one character class must be enabled")]
    NoCharacterClasses,

    #[error("Length {length} is too short to include all {required} enabled character classes")]
    TooShort { length: usize, required: usize },
}

/// What a generated password must contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub length: usize,
    pub lowercase: bool,
    pub uppercase: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            lowercase: true,
            uppercase: true,
            digits: true,
            symbols: true,
        }
    }
}

impl PasswordPolicy {
    fn classes(&self) -> Vec<&'static [u8]> {
        [
            (self.lowercase, LOWERCASE),
            (self.uppercase, UPPERCASE),
            (self.digits, DIGITS),
            (self.symbols, SYMBOLS),
        ]
        .into_iter()
        .filter_map(|(enabled, set)| enabled.then_some(set))
        .collect()
    }
}

/// Generate a password satisfying `policy`.
///
/// Every enabled class contributes at least one character; the rest are drawn
/// from the union of enabled classes, then the whole is shuffled.
pub fn generate(policy: &PasswordPolicy) -> Result<String, GeneratorError> {
    let classes = policy.classes();
    if classes.is_empty() {
        return Err(GeneratorError::NoCharacterClasses);
    }
    if policy.length < classes.len() {
        return Err(GeneratorError::TooShort {
            length: policy.length,
            required: classes.len(),
        });
    }

    let mut rng = rand::rng();
    let pool: Vec<u8> = classes.concat();

    let mut password: Vec<u8> = classes
        .iter()
        .map(|set| set[rng.random_range(..set.len())])
        .collect();
    password.extend((classes.len()..policy.length).map(|_| pool[rng.random_range(..pool.len())]));
    password.shuffle(&mut rng);

    Ok(password.into_iter().map(char::from).collect())
}

/// Score from 0 to 100: up to 40 for length, 15 per character class present.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn strength_score(password: &str) -> u8 {
    if password.is_empty() {
        return 0;
    }

    let length_score = (password.chars().count() as f64 * 2.5).min(40.0);

    let has = |pred: fn(&char) -> bool| u8::from(password.chars().any(|c| pred(&c)));
    let classes = has(char::is_ascii_lowercase)
        + has(char::is_ascii_uppercase)
        + has(char::is_ascii_digit)
        + has(char::is_ascii_punctuation);

    (length_score + f64::from(classes) * 15.0)
        .round_ties_even()
        .min(100.0) as u8
}

/// Banding of [`strength_score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrengthCategory {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl StrengthCategory {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..40 => StrengthCategory::Weak,
            40..70 => StrengthCategory::Moderate,
            70..90 => StrengthCategory::Strong,
            _ => StrengthCategory::VeryStrong,
        }
    }

    pub fn of(password: &str) -> Self {
        Self::from_score(strength_score(password))
    }
}

impl fmt::Display for StrengthCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrengthCategory::Weak => "Weak",
            StrengthCategory::Moderate => "Moderate",
            StrengthCategory::Strong => "Strong",
            StrengthCategory::VeryStrong => "Very Strong",
        })
    }
}
