//! Credential entry types.
//!
//! [`CredentialEntry`] is the persisted record: its `password` is always a
//! sealed token. Callers never receive it directly for reading secrets; the
//! store hands out [`EntryView`] copies whose [`PasswordField`] says whether
//! the secret is still sealed, revealed, or could not be opened.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

/// A stored credential. `password` holds ciphertext, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub username: String,
    /// Sealed token produced by [`CipherBox::seal`](crate::crypto::CipherBox::seal).
    pub password: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub notes: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub modified_at: DateTime<Utc>,
}

/// Stored timestamps: RFC 3339, or a naive ISO 8601 local time as written by
/// older stores, which is taken as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, de};

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        parse(&text).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{text}'")))
    }

    pub(super) fn parse(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(at) = DateTime::parse_from_rfc3339(text) {
            return Some(at.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

impl CredentialEntry {
    /// Case-insensitive substring match over the searchable metadata.
    ///
    /// `needle` must already be lowercase. The password is never compared.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        [&self.title, &self.username, &self.website, &self.notes]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Fields for a new entry. The password is plaintext until the store seals it.
pub struct NewEntry {
    pub title: String,
    pub username: String,
    pub password: Zeroizing<String>,
    pub website: String,
    pub category: String,
    pub notes: String,
}

impl NewEntry {
    pub fn new(
        title: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            username: username.into(),
            password: Zeroizing::new(password.into()),
            website: String::new(),
            category: String::new(),
            notes: String::new(),
        }
    }

    #[must_use]
    pub fn website(mut self, website: impl Into<String>) -> Self {
        self.website = website.into();
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

impl fmt::Debug for NewEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewEntry")
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("website", &self.website)
            .field("category", &self.category)
            .field("notes", &self.notes)
            .finish()
    }
}

/// Partial update: only the fields that are `Some` are replaced.
#[derive(Default)]
pub struct EntryUpdate {
    pub title: Option<String>,
    pub username: Option<String>,
    pub password: Option<Zeroizing<String>>,
    pub website: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
}

impl EntryUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    #[must_use]
    pub fn website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.website.is_none()
            && self.category.is_none()
            && self.notes.is_none()
    }
}

impl fmt::Debug for EntryUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryUpdate")
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("website", &self.website)
            .field("category", &self.category)
            .field("notes", &self.notes)
            .finish()
    }
}

/// State of the password in an [`EntryView`].
#[derive(Clone, PartialEq, Eq)]
pub enum PasswordField {
    /// Still the stored ciphertext token.
    Sealed(String),
    /// Opened plaintext; wiped when dropped.
    Revealed(Zeroizing<String>),
    /// Opening failed (wrong key or damaged token).
    Unavailable,
}

impl PasswordField {
    /// Plaintext, if the password was revealed.
    pub fn revealed(&self) -> Option<&str> {
        match self {
            PasswordField::Revealed(plaintext) => Some(plaintext.as_str()),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, PasswordField::Unavailable)
    }
}

impl fmt::Debug for PasswordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordField::Sealed(token) => f.debug_tuple("Sealed").field(token).finish(),
            PasswordField::Revealed(_) => f.write_str("Revealed([REDACTED])"),
            PasswordField::Unavailable => f.write_str("Unavailable"),
        }
    }
}

/// A copy of an entry handed out by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    pub id: Uuid,
    pub title: String,
    pub username: String,
    pub password: PasswordField,
    pub website: String,
    pub category: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl EntryView {
    pub(crate) fn new(entry: &CredentialEntry, password: PasswordField) -> Self {
        Self {
            id: entry.id,
            title: entry.title.clone(),
            username: entry.username.clone(),
            password,
            website: entry.website.clone(),
            category: entry.category.clone(),
            notes: entry.notes.clone(),
            created_at: entry.created_at,
            modified_at: entry.modified_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CredentialEntry {
        let now = Utc::now();
        CredentialEntry {
            id: Uuid::new_v4(),
            title: "GitHub".into(),
            username: "octocat".into(),
            password: "sealed-token".into(),
            website: "https://github.com".into(),
            category: "Work".into(),
            notes: "2FA via phone".into(),
            created_at: now,
            modified_at: now,
        }
    }

    #[test]
    fn test_matches_is_case_insensitive_over_metadata() {
        let entry = sample();
        assert!(entry.matches("git"));
        assert!(entry.matches("octo"));
        assert!(entry.matches("2fa"));
        assert!(entry.matches(""));
        assert!(!entry.matches("sealed"));
        assert!(!entry.matches("work"));
    }

    #[test]
    fn test_debug_redacts_plaintext() {
        let new = NewEntry::new("Email", "me@x.com", "hunter2");
        assert!(!format!("{new:?}").contains("hunter2"));

        let update = EntryUpdate::new().password("hunter2");
        assert!(!format!("{update:?}").contains("hunter2"));

        let revealed = PasswordField::Revealed(Zeroizing::new("hunter2".into()));
        assert_eq!(format!("{revealed:?}"), "Revealed([REDACTED])");
    }

    #[test]
    fn test_update_is_empty() {
        assert!(EntryUpdate::new().is_empty());
        assert!(!EntryUpdate::new().notes("").is_empty());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{
            "id": "6f1c2d3e-4b5a-4c6d-8e7f-8091a2b3c4d5",
            "title": "Bank",
            "password": "tok",
            "created_at": "2024-01-01T00:00:00Z",
            "modified_at": "2024-01-01T00:00:00Z"
        }"#;
        let entry: CredentialEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.username, "");
        assert_eq!(entry.category, "");
    }

    #[test]
    fn test_naive_timestamps_read_as_utc() {
        let json = r#"{
            "id": "6f1c2d3e-4b5a-4c6d-8e7f-8091a2b3c4d5",
            "title": "Bank",
            "password": "tok",
            "created_at": "2024-03-05T14:07:09.123456",
            "modified_at": "2024-03-05T14:07:09"
        }"#;
        let entry: CredentialEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.created_at.to_rfc3339(), "2024-03-05T14:07:09.123456+00:00");
        assert_eq!(entry.modified_at.to_rfc3339(), "2024-03-05T14:07:09+00:00");

        let offset = timestamp::parse("2024-03-05T16:07:09+02:00").unwrap();
        assert_eq!(offset, entry.modified_at);
        assert!(timestamp::parse("yesterday").is_none());
    }
}
