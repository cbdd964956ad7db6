//! Session error types.

use sealbox_container::ContainerError;
use thiserror::Error;

/// Result type for edit sessions.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while running an edit session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl SessionError {
    /// True when the error is "the staged file is already gone" - the one
    /// condition the background sync swallows.
    pub(crate) fn is_staged_file_gone(&self) -> bool {
        match self {
            SessionError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            SessionError::Container(ContainerError::Io(e)) => {
                e.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}
