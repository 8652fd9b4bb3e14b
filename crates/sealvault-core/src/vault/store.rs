//! The persisted collection of credential entries.
//!
//! The whole collection is loaded into memory when a session starts and is
//! written back in full, atomically, after every mutation. There is no
//! incremental write path: a mutating call returns only after the new file is
//! durable on disk, and if the write fails the in-memory change is rolled back
//! so memory and disk never disagree.
//!
//! # File format
//!
//! ```json
//! {
//!   "version": 1,
//!   "canary": "<sealed token>",
//!   "entries": [ { "id": "...", "title": "...", ... } ]
//! }
//! ```
//!
//! A bare JSON array of entries is accepted as the legacy, unversioned format
//! (version 0, no canary). It is rewritten in the current format on the next
//! write. Timestamps are RFC 3339; naive ISO 8601 timestamps without an offset
//! are read as UTC.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::crypto::{CipherBox, SealError};
use crate::fs::{ensure_private_dir, write_atomic};

use super::entry::{CredentialEntry, EntryUpdate, EntryView, NewEntry, PasswordField};

/// Entry store format version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Errors from the entry store.
///
/// A malformed store file is not an error: it is set aside and the store
/// starts empty. These variants cover failures that must reach the caller.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error accessing entry store {}: {source}", .path.display())]
    Io {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    #[error("Failed to serialize entry store: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Written by a newer release; refusing to load avoids overwriting it.
    #[error(
        "Entry store {} has format version {found}, newest supported is {FORMAT_VERSION}",
        .path.display()
    )]
    UnsupportedVersion { path: PathBuf, found: u32 },

    #[error("Failed to seal password: {0}")]
    Seal(#[from] SealError),
}

impl StoreError {
    fn io(source: io::Error, path: &Path) -> Self {
        StoreError::Io {
            source,
            path: path.to_path_buf(),
        }
    }
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    canary: Option<&'a str>,
    entries: &'a [CredentialEntry],
}

#[derive(Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    canary: Option<String>,
    entries: Vec<CredentialEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredFormat {
    Versioned(StoreFile),
    Legacy(Vec<CredentialEntry>),
}

/// In-memory copy of the entry store, bound to the session's [`CipherBox`].
#[derive(Debug)]
pub struct VaultStore {
    path: PathBuf,
    cipher: CipherBox,
    entries: Vec<CredentialEntry>,
    canary: Option<String>,
    format_version: u32,
    recovered_from: Option<PathBuf>,
}

impl VaultStore {
    /// Load the store at `path`.
    ///
    /// A missing file gives an empty store. A file that cannot be parsed (or
    /// breaks the unique-id invariant) is renamed to
    /// `<name>.corrupt-<timestamp>` and an empty store is returned; see
    /// [`VaultStore::recovered_from`].
    #[instrument(level = "debug", skip(cipher), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>, cipher: CipherBox) -> Result<Self, StoreError> {
        let mut store = Self {
            path: path.as_ref().to_path_buf(),
            cipher,
            entries: Vec::new(),
            canary: None,
            format_version: FORMAT_VERSION,
            recovered_from: None,
        };

        let bytes = match fs::read(&store.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No entry store yet, starting empty");
                return Ok(store);
            }
            Err(e) => return Err(StoreError::io(e, &store.path)),
        };

        match parse_store(&bytes) {
            Ok(file) if file.version > FORMAT_VERSION => {
                return Err(StoreError::UnsupportedVersion {
                    path: store.path,
                    found: file.version,
                });
            }
            Ok(file) => {
                store.format_version = file.version;
                store.canary = file.canary;
                store.entries = file.entries;
            }
            Err(reason) => {
                let backup = set_aside(&store.path)?;
                warn!(
                    %reason,
                    backup = %backup.display(),
                    "Entry store is corrupt; moved aside and starting empty"
                );
                store.recovered_from = Some(backup);
            }
        }

        info!(
            entries = store.entries.len(),
            version = store.format_version,
            "Loaded entry store"
        );
        Ok(store)
    }

    /// Create a fresh, empty store containing only `canary`, and persist it.
    pub(crate) fn create(
        path: impl AsRef<Path>,
        cipher: CipherBox,
        canary: String,
    ) -> Result<Self, StoreError> {
        let mut store = Self {
            path: path.as_ref().to_path_buf(),
            cipher,
            entries: Vec::new(),
            canary: Some(canary),
            format_version: FORMAT_VERSION,
            recovered_from: None,
        };
        store.persist()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored entries in insertion order, passwords sealed.
    pub fn entries(&self) -> &[CredentialEntry] {
        &self.entries
    }

    /// Format version the file had when loaded (0 for the legacy array).
    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Where a corrupt store file was moved when this store was loaded.
    pub fn recovered_from(&self) -> Option<&Path> {
        self.recovered_from.as_deref()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.position(id).is_some()
    }

    pub(crate) fn cipher(&self) -> &CipherBox {
        &self.cipher
    }

    pub(crate) fn canary(&self) -> Option<&str> {
        self.canary.as_deref()
    }

    pub(crate) fn install_canary(&mut self, canary: String) -> Result<(), StoreError> {
        let previous = self.canary.replace(canary);
        if let Err(e) = self.persist() {
            self.canary = previous;
            return Err(e);
        }
        info!("Installed key canary in entry store");
        Ok(())
    }

    /// Seal the password, append a new entry, and persist.
    #[instrument(level = "debug", skip_all)]
    pub fn add_entry(&mut self, new: NewEntry) -> Result<Uuid, StoreError> {
        let NewEntry {
            title,
            username,
            password,
            website,
            category,
            notes,
        } = new;

        let sealed = self.cipher.seal(&password)?;
        let now = Utc::now();
        let id = self.fresh_id();

        self.entries.push(CredentialEntry {
            id,
            title,
            username,
            password: sealed,
            website,
            category,
            notes,
            created_at: now,
            modified_at: now,
        });

        if let Err(e) = self.persist() {
            self.entries.pop();
            return Err(e);
        }

        info!(%id, "Added entry");
        Ok(id)
    }

    /// Copy of the entry with its password opened.
    ///
    /// If the password cannot be opened the copy carries
    /// [`PasswordField::Unavailable`]; the call itself still succeeds.
    pub fn get_entry(&self, id: Uuid) -> Option<EntryView> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| EntryView::new(entry, self.reveal(entry)))
    }

    /// Replace the supplied fields, refresh `modified_at`, and persist.
    ///
    /// Returns `Ok(false)` if no entry has this id.
    #[instrument(level = "debug", skip(self, update), fields(%id))]
    pub fn update_entry(&mut self, id: Uuid, update: EntryUpdate) -> Result<bool, StoreError> {
        let Some(index) = self.position(id) else {
            debug!("Update of unknown entry");
            return Ok(false);
        };

        let sealed = update
            .password
            .as_ref()
            .map(|password| self.cipher.seal(password))
            .transpose()?;

        let previous = self.entries[index].clone();
        let entry = &mut self.entries[index];
        if let Some(title) = update.title {
            entry.title = title;
        }
        if let Some(username) = update.username {
            entry.username = username;
        }
        if let Some(sealed) = sealed {
            entry.password = sealed;
        }
        if let Some(website) = update.website {
            entry.website = website;
        }
        if let Some(category) = update.category {
            entry.category = category;
        }
        if let Some(notes) = update.notes {
            entry.notes = notes;
        }
        entry.modified_at = Utc::now();

        if let Err(e) = self.persist() {
            self.entries[index] = previous;
            return Err(e);
        }

        info!("Updated entry");
        Ok(true)
    }

    /// Remove the entry and persist. Returns `Ok(false)` if no entry has this id.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub fn delete_entry(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let Some(index) = self.position(id) else {
            debug!("Delete of unknown entry");
            return Ok(false);
        };

        let removed = self.entries.remove(index);
        if let Err(e) = self.persist() {
            self.entries.insert(index, removed);
            return Err(e);
        }

        info!("Deleted entry");
        Ok(true)
    }

    /// Copies of every entry, optionally with passwords opened.
    ///
    /// An entry whose password cannot be opened is still listed, with
    /// [`PasswordField::Unavailable`].
    pub fn list_all(&self, decrypt: bool) -> Vec<EntryView> {
        self.entries
            .iter()
            .map(|entry| {
                let password = if decrypt {
                    self.reveal(entry)
                } else {
                    PasswordField::Sealed(entry.password.clone())
                };
                EntryView::new(entry, password)
            })
            .collect()
    }

    /// Case-insensitive substring search over title, username, website and notes.
    ///
    /// With `categories`, only entries whose category is in the set are
    /// considered; an empty set filters nothing. Results keep their passwords
    /// sealed.
    pub fn search(&self, query: &str, categories: Option<&BTreeSet<String>>) -> Vec<EntryView> {
        let needle = query.to_lowercase();
        let categories = categories.filter(|set| !set.is_empty());

        self.entries
            .iter()
            .filter(|entry| categories.is_none_or(|set| set.contains(&entry.category)))
            .filter(|entry| entry.matches(&needle))
            .map(|entry| EntryView::new(entry, PasswordField::Sealed(entry.password.clone())))
            .collect()
    }

    /// Distinct non-empty categories, sorted.
    pub fn list_categories(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|entry| !entry.category.is_empty())
            .map(|entry| entry.category.clone())
            .collect()
    }

    fn reveal(&self, entry: &CredentialEntry) -> PasswordField {
        match self.cipher.open(&entry.password) {
            Ok(plaintext) => PasswordField::Revealed(plaintext),
            Err(e) => {
                warn!(id = %entry.id, error = %e, "Stored password could not be opened");
                PasswordField::Unavailable
            }
        }
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    fn fresh_id(&self) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if !self.contains(id) {
                return id;
            }
        }
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let file = StoreFileRef {
            version: FORMAT_VERSION,
            canary: self.canary.as_deref(),
            entries: &self.entries,
        };
        let json = serde_json::to_vec_pretty(&file)?;

        if let Some(dir) = self.path.parent() {
            ensure_private_dir(dir).map_err(|e| StoreError::io(e, &self.path))?;
        }
        write_atomic(&self.path, &json).map_err(|e| StoreError::io(e, &self.path))?;

        self.format_version = FORMAT_VERSION;
        debug!(entries = self.entries.len(), bytes = json.len(), "Persisted entry store");
        Ok(())
    }
}

/// Parse either file format. `Err` carries the reason the file is unusable.
fn parse_store(bytes: &[u8]) -> Result<StoreFile, String> {
    let file = match serde_json::from_slice::<StoredFormat>(bytes).map_err(|e| e.to_string())? {
        StoredFormat::Versioned(file) => file,
        StoredFormat::Legacy(entries) => StoreFile {
            version: 0,
            canary: None,
            entries,
        },
    };

    if !ids_unique(&file.entries) {
        return Err("duplicate entry ids".to_string());
    }
    Ok(file)
}

fn ids_unique(entries: &[CredentialEntry]) -> bool {
    let mut seen = HashSet::with_capacity(entries.len());
    entries.iter().all(|entry| seen.insert(entry.id))
}

/// Move a corrupt store file out of the way so a later write cannot destroy it.
fn set_aside(path: &Path) -> Result<PathBuf, StoreError> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{stamp}"));
    let backup = path.with_file_name(name);

    fs::rename(path, &backup).map_err(|e| StoreError::io(e, path))?;
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Salt, derive_key};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn cipher(password: &str) -> CipherBox {
        CipherBox::new(derive_key(password, &Salt::from_bytes([4u8; 16])))
    }

    fn open_store(temp: &TempDir) -> VaultStore {
        VaultStore::load(temp.path().join("passwords.json"), cipher("store-password")).unwrap()
    }

    fn github() -> NewEntry {
        NewEntry::new("GitHub", "octocat", "gh-secret")
            .website("https://github.com")
            .category("Work")
            .notes("org admin")
    }

    #[test]
    fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        assert!(store.is_empty());
        assert!(store.recovered_from().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_entry_lifecycle() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);

        let id = store.add_entry(github()).unwrap();
        let view = store.get_entry(id).unwrap();
        assert_eq!(view.title, "GitHub");
        assert_eq!(view.username, "octocat");
        assert_eq!(view.website, "https://github.com");
        assert_eq!(view.category, "Work");
        assert_eq!(view.notes, "org admin");
        assert_eq!(view.password.revealed(), Some("gh-secret"));
        assert_eq!(view.created_at, view.modified_at);

        assert!(store.delete_entry(id).unwrap());
        assert!(store.get_entry(id).is_none());
        assert!(!store.delete_entry(id).unwrap());
    }

    #[test]
    fn test_password_is_never_stored_in_plaintext() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        store.add_entry(github()).unwrap();

        let on_disk = fs::read_to_string(store.path()).unwrap();
        assert!(!on_disk.contains("gh-secret"));
        assert_ne!(store.entries()[0].password, "gh-secret");
    }

    #[test]
    fn test_update_is_partial() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        let id = store.add_entry(github()).unwrap();
        let before = store.get_entry(id).unwrap();
        let sealed_before = store.entries()[0].password.clone();

        thread::sleep(Duration::from_millis(5));
        assert!(store.update_entry(id, EntryUpdate::new().title("X")).unwrap());

        let after = store.get_entry(id).unwrap();
        assert_eq!(after.title, "X");
        assert_eq!(after.username, before.username);
        assert_eq!(after.website, before.website);
        assert_eq!(after.category, before.category);
        assert_eq!(after.notes, before.notes);
        assert_eq!(after.password.revealed(), Some("gh-secret"));
        assert_eq!(store.entries()[0].password, sealed_before);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.modified_at > before.modified_at);
    }

    #[test]
    fn test_update_password_reseals() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        let id = store.add_entry(github()).unwrap();
        let sealed_before = store.entries()[0].password.clone();

        assert!(store.update_entry(id, EntryUpdate::new().password("rotated")).unwrap());

        assert_ne!(store.entries()[0].password, sealed_before);
        assert_eq!(store.get_entry(id).unwrap().password.revealed(), Some("rotated"));
    }

    #[test]
    fn test_update_unknown_id() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        assert!(!store.update_entry(Uuid::new_v4(), EntryUpdate::new().title("X")).unwrap());
    }

    #[test]
    fn test_persists_across_reload_in_insertion_order() {
        let temp = TempDir::new().unwrap();
        let titles = ["Email", "Bank", "GitHub", "Alpha"];
        {
            let mut store = open_store(&temp);
            for title in titles {
                store.add_entry(NewEntry::new(title, "me", "pw")).unwrap();
            }
        }

        let store = open_store(&temp);
        let loaded: Vec<_> = store.entries().iter().map(|e| e.title.as_str()).collect();
        assert_eq!(loaded, titles);
        assert_eq!(store.format_version(), FORMAT_VERSION);
    }

    #[test]
    fn test_search_and_categories() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        store.add_entry(github()).unwrap();
        store
            .add_entry(NewEntry::new("Chase", "me", "pw").category("Banking").notes("checking"))
            .unwrap();
        store.add_entry(NewEntry::new("Forum", "gitfan", "pw")).unwrap();

        let found: Vec<_> = store.search("git", None).into_iter().map(|v| v.title).collect();
        assert_eq!(found, ["GitHub", "Forum"]);

        let banking = BTreeSet::from(["Banking".to_string()]);
        assert!(store.search("git", Some(&banking)).is_empty());
        assert_eq!(store.search("CHECK", Some(&banking)).len(), 1);

        let work = BTreeSet::from(["Work".to_string()]);
        let hits = store.search("git", Some(&work));
        assert_eq!(hits.len(), 1);
        assert!(matches!(hits[0].password, PasswordField::Sealed(_)));

        assert_eq!(store.search("git", Some(&BTreeSet::new())).len(), 2);
        assert!(store.search("gh-secret", None).is_empty());
    }

    #[test]
    fn test_list_categories_sorted_distinct_non_empty() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        for category in ["Work", "", "Banking", "Work", "Email"] {
            store.add_entry(NewEntry::new("t", "u", "p").category(category)).unwrap();
        }

        let categories: Vec<_> = store.list_categories().into_iter().collect();
        assert_eq!(categories, ["Banking", "Email", "Work"]);
    }

    #[test]
    fn test_list_all_survives_undecryptable_entry() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);
        store.add_entry(NewEntry::new("good", "u", "fine")).unwrap();
        store.add_entry(NewEntry::new("bad", "u", "lost")).unwrap();
        store.entries[1].password = "AAAA".into();

        let listed = store.list_all(true);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].password.revealed(), Some("fine"));
        assert!(listed[1].password.is_unavailable());

        let sealed = store.list_all(false);
        assert!(matches!(sealed[0].password, PasswordField::Sealed(ref t) if t == &store.entries()[0].password));

        let bad = store.get_entry(store.entries()[1].id).unwrap();
        assert!(bad.password.is_unavailable());
    }

    #[test]
    fn test_corrupt_store_is_set_aside() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("passwords.json");
        fs::write(&path, b"{ not json").unwrap();

        let store = open_store(&temp);
        assert!(store.is_empty());
        let backup = store.recovered_from().unwrap().to_path_buf();
        assert!(!path.exists());
        assert_eq!(fs::read(&backup).unwrap(), b"{ not json");
        assert!(backup.file_name().unwrap().to_string_lossy().starts_with("passwords.json.corrupt-"));
    }

    #[test]
    fn test_duplicate_ids_treated_as_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("passwords.json");
        let entry = r#"{"id":"6f1c2d3e-4b5a-4c6d-8e7f-8091a2b3c4d5","title":"a","password":"t",
            "created_at":"2024-01-01T00:00:00Z","modified_at":"2024-01-01T00:00:00Z"}"#;
        fs::write(&path, format!(r#"{{"version":1,"entries":[{entry},{entry}]}}"#)).unwrap();

        let store = open_store(&temp);
        assert!(store.is_empty());
        assert!(store.recovered_from().is_some());
    }

    #[test]
    fn test_legacy_array_format() {
        let temp = TempDir::new().unwrap();
        let sealed = cipher("store-password").seal("legacy-pw").unwrap();
        let legacy = serde_json::json!([{
            "id": "6f1c2d3e-4b5a-4c6d-8e7f-8091a2b3c4d5",
            "title": "Old",
            "username": "me",
            "password": sealed,
            "website": "",
            "category": "",
            "notes": "",
            "created_at": "2024-01-01T00:00:00Z",
            "modified_at": "2024-01-01T00:00:00Z"
        }]);
        fs::write(temp.path().join("passwords.json"), legacy.to_string()).unwrap();

        let mut store = open_store(&temp);
        assert_eq!(store.format_version(), 0);
        assert!(store.canary().is_none());
        let id = store.entries()[0].id;
        assert_eq!(store.get_entry(id).unwrap().password.revealed(), Some("legacy-pw"));

        store.update_entry(id, EntryUpdate::new().notes("migrated")).unwrap();
        let on_disk: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["version"], 1);
    }

    #[test]
    fn test_newer_format_is_refused() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("passwords.json");
        fs::write(&path, r#"{"version":99,"entries":[]}"#).unwrap();

        let err = VaultStore::load(&path, cipher("store-password")).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion { found: 99, .. }));
        assert!(path.exists());
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("vault");
        let mut store =
            VaultStore::load(dir.join("passwords.json"), cipher("store-password")).unwrap();

        // A plain file where the vault directory should be
        fs::write(&dir, b"").unwrap();
        let err = store.add_entry(github()).unwrap_err();

        assert!(matches!(err, StoreError::Io { .. }));
        assert!(store.is_empty());
    }
}
