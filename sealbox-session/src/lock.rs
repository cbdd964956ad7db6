//! Advisory session lock.
//!
//! Scoped to the container path (`<container>.lock`), acquired with
//! zero-wait semantics: a held lock immediately selects the session's
//! reader-fallback branch instead of blocking. The lock file itself is
//! left in place after release; only the flock state matters, and
//! unlinking it would let a third opener bypass a still-held lock.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

/// Outcome of a non-blocking lock attempt.
pub enum LockState {
    /// This session holds the lock and may mutate the container.
    Locked(SessionLock),
    /// Another session holds it; fall back to read-only.
    Busy,
}

/// Held advisory lock. Released on drop.
pub struct SessionLock {
    file: File,
    path: PathBuf,
}

impl SessionLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(lock = %self.path.display(), "session lock released");
    }
}

/// Lock file path for a container.
pub fn lock_path(container: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lock", container.display()))
}

/// Tries to take the exclusive advisory lock for `container`.
///
/// Never blocks: contention is reported as [`LockState::Busy`], every
/// other failure is a real I/O error.
pub fn try_acquire(container: &Path) -> io::Result<LockState> {
    let path = lock_path(container);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&path)?;

    match file.try_lock_exclusive() {
        Ok(()) => {
            debug!(lock = %path.display(), "session lock acquired");
            Ok(LockState::Locked(SessionLock { file, path }))
        }
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            debug!(lock = %path.display(), "session lock busy");
            Ok(LockState::Busy)
        }
        Err(e) => Err(e),
    }
}
