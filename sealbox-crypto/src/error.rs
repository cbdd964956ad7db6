//! Crypto layer error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in the crypto layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed (wrong key or tampered data)")]
    DecryptionFailed,

    #[error("invalid key length: expected {expected}, actual {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("bad public key: {0}")]
    BadPublicKey(String),

    #[error("bad private key: {0}")]
    BadPrivateKey(String),

    #[error("wrong passphrase for private key")]
    WrongPassphrase,

    #[error("private key is encrypted, passphrase required")]
    PassphraseRequired,

    #[error("unsupported key type: {0} (only ssh-rsa keys can wrap a master key)")]
    UnsupportedKeyType(String),

    #[error("key wrap failed: {0}")]
    Wrap(String),

    #[error("key unwrap failed (wrong key or tampered envelope)")]
    Unwrap,

    #[error("signature verification failed")]
    BadSignature,

    #[error("signing failed: {0}")]
    Signing(String),
}
