//! Staged plaintext files.
//!
//! The decrypted payload is materialized under a unique name in volatile
//! storage - `/dev/shm` (tmpfs, never swapped to disk) when available,
//! the platform temp dir otherwise. The file is created 0600 and removed
//! on drop, so every exit path of a session cleans up, and removal
//! tolerates the file already being gone.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

const RAMFS: &str = "/dev/shm";

/// Directory staged plaintext goes into.
pub(crate) fn staging_dir() -> PathBuf {
    let shm = Path::new(RAMFS);
    if shm.is_dir() {
        shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}

/// A staged plaintext file, exclusively owned by one session.
pub(crate) struct StagedFile {
    path: PathBuf,
    dir: PathBuf,
}

impl StagedFile {
    /// Creates a uniquely named staged file containing `plaintext`.
    pub fn create(plaintext: &[u8]) -> io::Result<Self> {
        let dir = staging_dir();
        let temp = tempfile::Builder::new()
            .prefix("sealbox-")
            .suffix(".plain")
            .tempfile_in(&dir)?;
        let (mut file, path) = temp.keep().map_err(|e| e.error)?;

        file.write_all(plaintext)?;
        file.flush()?;
        drop(file); // closed before any watcher starts

        debug!(staged = %path.display(), "staged plaintext created");
        Ok(Self { path, dir })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Toggles the staged file between read-only (0400) and writable
    /// (0600).
    pub fn set_readonly(&self, readonly: bool) -> io::Result<()> {
        set_mode(&self.path, if readonly { 0o400 } else { 0o600 })
    }

    /// Consumes and deletes the staged file now instead of at drop time.
    pub fn remove(self) {
        drop(self);
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(staged = %self.path.display(), "staged plaintext removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(staged = %self.path.display(), error = %e, "failed to remove staged plaintext"),
        }
    }
}

/// Rewrites a staged file in place, briefly making it writable.
///
/// Used by reader-fallback sessions to follow the writer's changes.
pub(crate) fn refresh(path: &Path, plaintext: &[u8]) -> io::Result<()> {
    set_mode(path, 0o600)?;
    fs::write(path, plaintext)?;
    set_mode(path, 0o400)
}

fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}
