//! Filesystem helpers for the vault directory.
//!
//! Everything the vault persists is written either once (the salt) or as a
//! whole-file replacement (the entry store). Both go through this module so
//! permissions and durability are handled in one place.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, trace};

/// Create `dir` (and parents) if missing, owner-only on Unix.
pub(crate) fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(dir)?;
    debug!(dir = %dir.display(), "Created vault directory");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}

/// Write a brand-new file, failing if it already exists.
///
/// The file is fsynced before returning.
pub(crate) fn write_new_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    sync_parent(path)
}

/// Replace `path` with `contents` atomically.
///
/// The data lands in a temporary file next to the target, is fsynced, and is
/// then renamed over the target. A crash at any point leaves either the old
/// file or the new one on disk, never a torn write.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = parent_dir(path);
    let prefix = format!(
        ".{}.",
        path.file_name()
            .map_or_else(|| "vault".into(), |name| name.to_string_lossy())
    );

    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    trace!(temp = %temp.path().display(), "Temporary file written");

    temp.persist(path).map_err(|e| e.error)?;
    sync_parent(path)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    File::open(parent_dir(path))?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}
