//! Container and registry error types.

use sealbox_crypto::CryptoError;
use thiserror::Error;

/// Result type for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors that can occur in the container engine and identity registry.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("unsupported container version: {0}")]
    UnsupportedVersion(String),

    /// The derived or recovered master key failed the challenge check.
    /// Covers both a wrong password and a tampered auth section; callers
    /// only learn pass/fail.
    #[error("master key is invalid")]
    InvalidSignature,

    #[error("identity {0} is already present")]
    AlreadyPresent(String),

    #[error("identity {0} not found")]
    NotFound(String),

    #[error("no key registered for {0}")]
    NotRegistered(String),

    #[error("auth id not given and the public key has no comment to derive one from")]
    NoAuthId,

    #[error("malformed container: {0}")]
    Malformed(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
