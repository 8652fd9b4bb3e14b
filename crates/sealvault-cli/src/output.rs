use chrono::{DateTime, Local, Utc};
use comfy_table::Table;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use serde::Serialize;
use uuid::Uuid;

use sealvault_core::vault::{EntryView, PasswordField};

/// Create a styled table for output
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}

/// First block of the id, enough to pass back as a prefix
pub fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Local time, minute precision
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Render a password for a table cell
pub fn format_password(password: &PasswordField, show: bool) -> String {
    match password {
        PasswordField::Revealed(plaintext) if show => plaintext.as_str().to_string(),
        PasswordField::Unavailable => "<unavailable>".to_string(),
        _ => "********".to_string(),
    }
}

/// Entry listing as a table (no passwords)
pub fn entries_table(entries: &[EntryView]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["ID", "Title", "Username", "Website", "Category", "Modified"]);
    for entry in entries {
        table.add_row(vec![
            short_id(entry.id),
            entry.title.clone(),
            entry.username.clone(),
            entry.website.clone(),
            entry.category.clone(),
            format_timestamp(entry.modified_at),
        ]);
    }
    table
}

/// JSON shape of an entry. `password` is present only when revealed and requested.
#[derive(Serialize)]
pub struct EntryJson<'a> {
    pub id: Uuid,
    pub title: &'a str,
    pub username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub password_unavailable: bool,
    pub website: &'a str,
    pub category: &'a str,
    pub notes: &'a str,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl<'a> EntryJson<'a> {
    pub fn new(entry: &'a EntryView, with_password: bool) -> Self {
        Self {
            id: entry.id,
            title: &entry.title,
            username: &entry.username,
            password: entry.password.revealed().filter(|_| with_password),
            password_unavailable: entry.password.is_unavailable(),
            website: &entry.website,
            category: &entry.category,
            notes: &entry.notes,
            created_at: entry.created_at,
            modified_at: entry.modified_at,
        }
    }
}

pub fn entries_json(entries: &[EntryView]) -> Vec<EntryJson<'_>> {
    entries.iter().map(|entry| EntryJson::new(entry, false)).collect()
}
