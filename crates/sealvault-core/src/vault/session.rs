//! The authentication boundary.
//!
//! A [`VaultSession`] exists only after the master password has been
//! validated. It owns the loaded store (and through it the cipher and derived
//! key) behind a mutex shared with the idle timer. Locking drops all of it;
//! every later store access returns [`SessionError::Locked`].
//!
//! The password is checked against a sealed canary kept in its own file
//! next to the salt, and mirrored inside the entry store. The canary file is
//! checked before the store is even read, so losing or damaging
//! `passwords.json` never lets a different password in.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::crypto::{CipherBox, SaltError, derive_key, load_or_create_salt, load_salt};
use crate::fs::write_new_private_file;

use super::entry::{EntryUpdate, EntryView, NewEntry};
use super::layout::VaultLayout;
use super::store::{StoreError, VaultStore};
use super::timer::IdleTimer;

/// Minimum master password length, in characters.
pub const MIN_MASTER_PASSWORD_LEN: usize = 8;

/// Idle time after which an unlocked session locks itself.
pub const DEFAULT_AUTO_LOCK: Duration = Duration::from_secs(300);

/// Known plaintext sealed into the canary to verify the master password.
const CANARY_PLAINTEXT: &str = "sealvault:canary:v1";

/// Errors from session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Master password must be at least {min_len} characters")]
    WeakPassword { min_len: usize },

    /// Wrong master password. Deliberately says nothing about vault contents.
    #[error("Authentication failed: incorrect master password")]
    AuthenticationFailed,

    /// The entry store was damaged and nothing left on disk can confirm the
    /// master password.
    #[error(
        "Entry store was damaged (moved to {}) and the vault has no key canary; \
         the master password cannot be verified",
        .backup.display()
    )]
    KeyUnverifiable { backup: PathBuf },

    #[error("Vault is locked")]
    Locked,

    #[error("No vault found at {}", .0.display())]
    VaultNotFound(PathBuf),

    #[error("A vault already exists at {}", .0.display())]
    VaultAlreadyExists(PathBuf),

    #[error("IO error accessing key canary {}: {source}", .path.display())]
    Canary {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    #[error(transparent)]
    Salt(#[from] SaltError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to start auto-lock timer: {0}")]
    Timer(#[source] io::Error),
}

impl SessionError {
    fn canary(source: io::Error, path: &Path) -> Self {
        SessionError::Canary {
            source,
            path: path.to_path_buf(),
        }
    }
}

/// Session tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Idle time before auto-lock; `None` disables auto-lock.
    pub auto_lock: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_lock: Some(DEFAULT_AUTO_LOCK),
        }
    }
}

impl SessionOptions {
    /// Options with auto-lock disabled, for one-shot hosts.
    pub fn without_auto_lock() -> Self {
        Self { auto_lock: None }
    }
}

/// State shared with the idle timer.
#[derive(Debug)]
struct SessionState {
    store: Option<VaultStore>,
    /// End of the most recent store access.
    last_activity: Instant,
}

type SharedState = Arc<Mutex<SessionState>>;

/// An unlocked (or since locked) vault.
#[derive(Debug)]
pub struct VaultSession {
    layout: VaultLayout,
    state: SharedState,
    timer: Option<IdleTimer>,
}

impl VaultSession {
    /// First-run flow: set up a new vault protected by `master_password`.
    ///
    /// An existing salt is reused; an existing entry store or canary is never
    /// replaced.
    #[instrument(level = "info", skip_all, fields(dir = %layout.dir().display()))]
    pub fn create_vault(
        layout: &VaultLayout,
        master_password: &str,
        options: &SessionOptions,
    ) -> Result<Self, SessionError> {
        check_password_policy(master_password)?;

        let entries_path = layout.entries_path();
        let canary_path = layout.canary_path();
        if entries_path.exists() || canary_path.exists() {
            return Err(SessionError::VaultAlreadyExists(layout.dir().to_path_buf()));
        }

        let salt = load_or_create_salt(&layout.salt_path())?;
        let cipher = CipherBox::new(derive_key(master_password, &salt));
        let canary = cipher.seal(CANARY_PLAINTEXT).map_err(StoreError::from)?;

        write_new_private_file(&canary_path, canary.as_bytes()).map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                SessionError::VaultAlreadyExists(layout.dir().to_path_buf())
            } else {
                SessionError::canary(e, &canary_path)
            }
        })?;
        let store = VaultStore::create(entries_path, cipher, canary)?;

        info!("Created vault");
        Self::start(layout.clone(), store, options)
    }

    /// Unlock an existing vault.
    ///
    /// On any failure the derived key is dropped before returning. A wrong
    /// password is rejected by the canary file before the entry store is
    /// read.
    #[instrument(level = "info", skip_all, fields(dir = %layout.dir().display()))]
    pub fn unlock(
        layout: &VaultLayout,
        master_password: &str,
        options: &SessionOptions,
    ) -> Result<Self, SessionError> {
        if !layout.is_initialized() {
            return Err(SessionError::VaultNotFound(layout.dir().to_path_buf()));
        }

        let salt = load_salt(&layout.salt_path())?;
        let cipher = CipherBox::new(derive_key(master_password, &salt));

        let canary_path = layout.canary_path();
        let file_canary = read_canary_file(&canary_path)?;
        if let Some(canary) = &file_canary {
            verify_canary(&cipher, canary)?;
        }

        let mut store = VaultStore::load(layout.entries_path(), cipher)?;
        let store_canary = store.canary().map(str::to_owned);

        match (file_canary, store_canary) {
            (Some(_), Some(_)) => {}
            (Some(canary), None) => {
                // Store was missing, recovered or never had one.
                if let Err(e) = store.install_canary(canary) {
                    warn!(error = %e, "Could not restore the canary in the entry store");
                }
            }
            (None, Some(canary)) => {
                verify_canary(store.cipher(), &canary)?;
                restore_canary_file(&canary_path, &canary);
            }
            (None, None) => {
                verify_legacy(&mut store)?;
                if let Some(canary) = store.canary() {
                    restore_canary_file(&canary_path, canary);
                }
            }
        }

        info!(entries = store.len(), "Vault unlocked");
        Self::start(layout.clone(), store, options)
    }

    fn start(
        layout: VaultLayout,
        store: VaultStore,
        options: &SessionOptions,
    ) -> Result<Self, SessionError> {
        let state: SharedState = Arc::new(Mutex::new(SessionState {
            store: Some(store),
            last_activity: Instant::now(),
        }));

        let timer = options
            .auto_lock
            .map(|timeout| {
                let weak = Arc::downgrade(&state);
                IdleTimer::start(timeout, move || expire(&weak, timeout))
            })
            .transpose()
            .map_err(SessionError::Timer)?;

        Ok(Self {
            layout,
            state,
            timer,
        })
    }

    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    /// Drop the store, cipher and derived key. Safe to call repeatedly.
    pub fn lock(&self) {
        if let Some(timer) = &self.timer {
            timer.disarm();
        }
        if self.state.lock().store.take().is_some() {
            info!("Vault locked");
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().store.is_none()
    }

    /// Record user activity, postponing auto-lock.
    pub fn touch(&self) -> Result<(), SessionError> {
        self.with_store(|_| ())
    }

    /// Run `f` against the unlocked store.
    ///
    /// The idle countdown restarts when `f` returns, so a long operation
    /// still gets the full timeout afterwards.
    pub fn with_store<R>(&self, f: impl FnOnce(&VaultStore) -> R) -> Result<R, SessionError> {
        let mut state = self.state.lock();
        let store = state.store.as_ref().ok_or(SessionError::Locked)?;
        let result = f(store);
        self.record_activity(&mut state);
        Ok(result)
    }

    /// Run `f` against the unlocked store, mutably.
    pub fn with_store_mut<R>(
        &self,
        f: impl FnOnce(&mut VaultStore) -> R,
    ) -> Result<R, SessionError> {
        let mut state = self.state.lock();
        let store = state.store.as_mut().ok_or(SessionError::Locked)?;
        let result = f(store);
        self.record_activity(&mut state);
        Ok(result)
    }

    pub fn add_entry(&self, entry: NewEntry) -> Result<Uuid, SessionError> {
        self.with_store_mut(|store| store.add_entry(entry))?
            .map_err(SessionError::from)
    }

    pub fn get_entry(&self, id: Uuid) -> Result<Option<EntryView>, SessionError> {
        self.with_store(|store| store.get_entry(id))
    }

    pub fn update_entry(&self, id: Uuid, update: EntryUpdate) -> Result<bool, SessionError> {
        self.with_store_mut(|store| store.update_entry(id, update))?
            .map_err(SessionError::from)
    }

    pub fn delete_entry(&self, id: Uuid) -> Result<bool, SessionError> {
        self.with_store_mut(|store| store.delete_entry(id))?
            .map_err(SessionError::from)
    }

    pub fn list_all(&self, decrypt: bool) -> Result<Vec<EntryView>, SessionError> {
        self.with_store(|store| store.list_all(decrypt))
    }

    pub fn search(
        &self,
        query: &str,
        categories: Option<&BTreeSet<String>>,
    ) -> Result<Vec<EntryView>, SessionError> {
        self.with_store(|store| store.search(query, categories))
    }

    pub fn list_categories(&self) -> Result<BTreeSet<String>, SessionError> {
        self.with_store(VaultStore::list_categories)
    }

    /// Called with the state lock held, so an expiry racing with `f` sees
    /// the new timestamp.
    fn record_activity(&self, state: &mut SessionState) {
        state.last_activity = Instant::now();
        if let Some(timer) = &self.timer {
            timer.rearm();
        }
    }
}

fn expire(state: &Weak<Mutex<SessionState>>, timeout: Duration) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let mut state = state.lock();
    if state.last_activity.elapsed() < timeout {
        debug!("Activity since the deadline was set, not locking");
        return;
    }
    if state.store.take().is_some() {
        info!("Vault auto-locked after inactivity");
    }
}

fn check_password_policy(master_password: &str) -> Result<(), SessionError> {
    if master_password.chars().count() < MIN_MASTER_PASSWORD_LEN {
        debug!("Rejected master password below minimum length");
        return Err(SessionError::WeakPassword {
            min_len: MIN_MASTER_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// `None` when the vault predates the canary file.
fn read_canary_file(path: &Path) -> Result<Option<String>, SessionError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text.trim().to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No canary file");
            Ok(None)
        }
        Err(e) => Err(SessionError::canary(e, path)),
    }
}

/// Write the canary file for a vault that lacks one. Failure only warns:
/// the store still carries the canary.
fn restore_canary_file(path: &Path, canary: &str) {
    match write_new_private_file(path, canary.as_bytes()) {
        Ok(()) => info!("Wrote key canary file"),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => warn!(error = %e, path = %path.display(), "Could not write key canary file"),
    }
}

fn verify_canary(cipher: &CipherBox, canary: &str) -> Result<(), SessionError> {
    let plaintext = cipher.open(canary).map_err(|e| {
        debug!(error = %e, "Canary did not open");
        SessionError::AuthenticationFailed
    })?;

    if bool::from(plaintext.as_bytes().ct_eq(CANARY_PLAINTEXT.as_bytes())) {
        Ok(())
    } else {
        warn!("Canary opened but holds unexpected plaintext");
        Err(SessionError::AuthenticationFailed)
    }
}

/// Vaults written before the canary existed.
///
/// A non-empty store where no password opens means a wrong key. When at
/// least one opens the key is proven and the canary is installed. An empty
/// store that was just recovered from corruption leaves nothing to check
/// against, so it is refused. An empty store that simply has no entries yet
/// is accepted and left as is.
fn verify_legacy(store: &mut VaultStore) -> Result<(), SessionError> {
    if store.is_empty() {
        if let Some(backup) = store.recovered_from() {
            warn!(backup = %backup.display(), "Damaged store and no canary, refusing unlock");
            return Err(SessionError::KeyUnverifiable {
                backup: backup.to_path_buf(),
            });
        }
        debug!("Empty legacy store, nothing to verify against");
        return Ok(());
    }

    let cipher = store.cipher();
    let verified = store
        .entries()
        .iter()
        .any(|entry| cipher.open(&entry.password).is_ok());
    if !verified {
        debug!(entries = store.len(), "No legacy entry opened");
        return Err(SessionError::AuthenticationFailed);
    }

    let canary = cipher.seal(CANARY_PLAINTEXT).map_err(StoreError::from)?;
    if let Err(e) = store.install_canary(canary) {
        warn!(error = %e, "Could not upgrade legacy store with a canary");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout(temp: &TempDir) -> VaultLayout {
        VaultLayout::new(temp.path().join("vault"))
    }

    #[test]
    fn test_weak_password_rejected_before_any_io() {
        let temp = TempDir::new().unwrap();
        let layout = layout(&temp);

        let err = VaultSession::create_vault(&layout, "short", &SessionOptions::without_auto_lock())
            .unwrap_err();
        assert!(matches!(err, SessionError::WeakPassword { min_len: 8 }));
        assert!(!layout.dir().exists());
    }

    #[test]
    fn test_password_length_counts_characters() {
        assert!(check_password_policy("ééééééé").is_err());
        assert!(check_password_policy("éééééééé").is_ok());
    }

    #[test]
    fn test_unlock_missing_vault() {
        let temp = TempDir::new().unwrap();
        let err = VaultSession::unlock(&layout(&temp), "whatever1", &SessionOptions::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::VaultNotFound(_)));
    }

    #[test]
    fn test_create_twice_refused() {
        let temp = TempDir::new().unwrap();
        let layout = layout(&temp);
        let options = SessionOptions::without_auto_lock();
        VaultSession::create_vault(&layout, "longenough1", &options).unwrap();

        let err = VaultSession::create_vault(&layout, "longenough2", &options).unwrap_err();
        assert!(matches!(err, SessionError::VaultAlreadyExists(_)));
    }

    #[test]
    fn test_lock_is_idempotent_and_blocks_access() {
        let temp = TempDir::new().unwrap();
        let session = VaultSession::create_vault(
            &layout(&temp),
            "longenough1",
            &SessionOptions::without_auto_lock(),
        )
        .unwrap();
        assert!(!session.is_locked());

        session.lock();
        session.lock();
        assert!(session.is_locked());
        assert!(matches!(session.list_all(false), Err(SessionError::Locked)));
        assert!(matches!(session.touch(), Err(SessionError::Locked)));
    }

    #[test]
    fn test_long_operation_restarts_idle_countdown() {
        let temp = TempDir::new().unwrap();
        let options = SessionOptions {
            auto_lock: Some(Duration::from_millis(100)),
        };
        let session = VaultSession::create_vault(&layout(&temp), "longenough1", &options).unwrap();

        // The deadline passes while the store is in use.
        session
            .with_store(|_| std::thread::sleep(Duration::from_millis(250)))
            .unwrap();
        assert!(!session.is_locked());

        std::thread::sleep(Duration::from_millis(400));
        assert!(session.is_locked());
    }

    #[test]
    fn test_create_refuses_existing_canary_file() {
        let temp = TempDir::new().unwrap();
        let layout = layout(&temp);
        std::fs::create_dir_all(layout.dir()).unwrap();
        std::fs::write(layout.canary_path(), "token").unwrap();

        let err = VaultSession::create_vault(&layout, "longenough1", &SessionOptions::without_auto_lock())
            .unwrap_err();
        assert!(matches!(err, SessionError::VaultAlreadyExists(_)));
        assert_eq!(std::fs::read_to_string(layout.canary_path()).unwrap(), "token");
    }

    #[test]
    fn test_verify_canary_rejects_other_plaintext() {
        let temp = TempDir::new().unwrap();
        let session = VaultSession::create_vault(
            &layout(&temp),
            "longenough1",
            &SessionOptions::without_auto_lock(),
        )
        .unwrap();

        session
            .with_store(|store| {
                let forged = store.cipher().seal("not the canary").unwrap();
                assert!(matches!(
                    verify_canary(store.cipher(), &forged),
                    Err(SessionError::AuthenticationFailed)
                ));
                assert!(verify_canary(store.cipher(), store.canary().unwrap()).is_ok());
            })
            .unwrap();
    }
}
