//! The edit session itself.
//!
//! One foreground thread runs the external command synchronously; one
//! background thread watches for filesystem change events and performs
//! the re-encrypt (writer mode) or re-decrypt (reader mode) side effect.
//! The two communicate only through a shared "still running" flag: set
//! before the command starts, cleared after it exits and before cleanup.
//! The watcher drains events already queued at shutdown and tolerates
//! the staged file's deletion racing with its last event.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use crate::command::{build_command, normalize_template};
use crate::error::SessionResult;
use crate::lock::{self, LockState};
use crate::staging::{self, StagedFile};
use crate::unlock::UnlockCapability;

/// How often the watcher thread re-checks the running flag between
/// events.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Which branch a session ended up in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionMode {
    /// Held the lock; edits flow back into the container.
    Writer,
    /// Lock was busy; read-only staged copy following the writer.
    Reader,
}

/// What happened during a session run.
#[derive(Debug)]
pub struct SessionReport {
    pub mode: SessionMode,
    /// Where the plaintext was staged (deleted again by the time the
    /// report is returned).
    pub staged_path: PathBuf,
    /// Exit code of the external command, when it exited normally.
    pub exit_status: Option<i32>,
}

/// An edit-in-place session over one unlock capability.
pub struct EditSession {
    capability: Arc<dyn UnlockCapability>,
    command: String,
}

impl EditSession {
    /// Binds a capability to a command template (`{filename}` or
    /// `[ filename ]` placeholder; appended as a trailing argument when
    /// absent).
    pub fn new(capability: Arc<dyn UnlockCapability>, command_template: &str) -> Self {
        Self {
            capability,
            command: normalize_template(command_template),
        }
    }

    /// Runs the session to completion.
    ///
    /// The session ends when the external command exits (however that
    /// happens) or when staging fails before it could start. Lock
    /// acquisition never blocks: a busy lock immediately selects
    /// reader-fallback mode.
    pub fn run(&self) -> SessionResult<SessionReport> {
        match lock::try_acquire(self.capability.target())? {
            LockState::Locked(guard) => {
                let report = self.run_writer();
                drop(guard);
                report
            }
            LockState::Busy => {
                info!(
                    container = %self.capability.target().display(),
                    "another session holds the lock, opening read-only"
                );
                self.run_reader()
            }
        }
    }

    /// Writer mode: edits to the staged file flow back into the
    /// container on every close-after-write.
    fn run_writer(&self) -> SessionResult<SessionReport> {
        let plaintext = self.capability.decrypt()?;
        let staged = StagedFile::create(&plaintext)?;
        let staged_path = staged.path().to_path_buf();

        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(staged.dir(), RecursiveMode::NonRecursive)?;

        let running = Arc::new(AtomicBool::new(true));
        let watcher_handle = {
            let running = Arc::clone(&running);
            let capability = Arc::clone(&self.capability);
            let staged_path = staged_path.clone();
            thread::spawn(move || {
                let _watcher = watcher; // keeps the watch alive until the loop exits
                write_back_loop(rx, &running, &staged_path, capability.as_ref());
            })
        };

        let command_result = run_command(&self.command, &staged_path);

        running.store(false, Ordering::SeqCst);
        let _ = watcher_handle.join();
        staged.remove();

        Ok(SessionReport {
            mode: SessionMode::Writer,
            staged_path,
            exit_status: command_result?,
        })
    }

    /// Reader-fallback mode: the staged copy is read-only and follows
    /// writes to the container; the container itself is never written.
    fn run_reader(&self) -> SessionResult<SessionReport> {
        // Canonicalized so the watcher's reported paths compare equal.
        let container = std::fs::canonicalize(self.capability.target())
            .unwrap_or_else(|_| self.capability.target().to_path_buf());
        let plaintext = self.capability.decrypt()?;
        let staged = StagedFile::create(&plaintext)?;
        staged.set_readonly(true)?;
        let staged_path = staged.path().to_path_buf();

        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(watch_dir(&container), RecursiveMode::NonRecursive)?;

        let running = Arc::new(AtomicBool::new(true));
        let watcher_handle = {
            let running = Arc::clone(&running);
            let capability = Arc::clone(&self.capability);
            let container = container.clone();
            let staged_path = staged_path.clone();
            thread::spawn(move || {
                let _watcher = watcher;
                refresh_loop(rx, &running, &container, &staged_path, capability.as_ref());
            })
        };

        let command_result = run_command(&self.command, &staged_path);

        running.store(false, Ordering::SeqCst);
        let _ = watcher_handle.join();
        staged.remove();

        Ok(SessionReport {
            mode: SessionMode::Reader,
            staged_path,
            exit_status: command_result?,
        })
    }
}

/// Runs the external command synchronously through the shell.
fn run_command(normalized: &str, staged: &Path) -> SessionResult<Option<i32>> {
    let line = build_command(normalized, staged);
    info!(command = %line, "running external program");

    let status = Command::new("sh").arg("-c").arg(&line).status()?;
    if !status.success() {
        warn!(status = %status, "external program exited with failure");
    }
    Ok(status.code())
}

/// Writer-mode watcher: re-encrypt the staged file on every
/// close-after-write.
fn write_back_loop(
    rx: Receiver<Result<Event, notify::Error>>,
    running: &AtomicBool,
    staged: &Path,
    capability: &dyn UnlockCapability,
) {
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => {
                if is_close_write(&event) && touches(&event, staged) {
                    debug!(staged = %staged.display(), "syncing staged plaintext into the container");
                    match capability.encrypt(staged) {
                        Ok(()) => {}
                        Err(e) if e.is_staged_file_gone() => {
                            // cleanup already deleted the staged file
                        }
                        Err(e) => error!(error = %e, "write-back failed"),
                    }
                }
            }
            Ok(Err(e)) => error!(error = %e, "watch error"),
            Err(RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Reader-mode watcher: refresh the staged copy on every
/// close-after-write of the container.
fn refresh_loop(
    rx: Receiver<Result<Event, notify::Error>>,
    running: &AtomicBool,
    container: &Path,
    staged: &Path,
    capability: &dyn UnlockCapability,
) {
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => {
                if is_close_write(&event) && touches(&event, container) {
                    debug!(container = %container.display(), "container changed, refreshing staged copy");
                    match capability.decrypt() {
                        Ok(plaintext) => match staging::refresh(staged, &plaintext) {
                            Ok(()) => {}
                            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                            Err(e) => error!(error = %e, "staged refresh failed"),
                        },
                        Err(e) => error!(error = %e, "re-decrypt failed"),
                    }
                }
            }
            Ok(Err(e)) => error!(error = %e, "watch error"),
            Err(RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn is_close_write(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
    )
}

fn touches(event: &Event, path: &Path) -> bool {
    event.paths.iter().any(|p| p == path)
}

/// Directory to watch for changes to `path`.
fn watch_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
