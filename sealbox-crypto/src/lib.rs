//! Cryptographic layer for sealbox.
//!
//! Provides the primitives the container engine is built on:
//! - PBKDF2-HMAC-SHA256 for key derivation from passwords
//! - ChaCha20-Poly1305 for authenticated encryption
//! - RSA-OAEP key wrapping and RSA-PSS signatures for SSH identities
//! - Secure key management with zeroization
//!
//! # Architecture
//!
//! The encryption uses a two-tier key system:
//!
//! 1. **Master key**: Derived from the user's password (or recovered by
//!    unwrapping an identity envelope). This key is never stored - it's
//!    derived each time the container is unlocked.
//!
//! 2. **Master data key**: A random key generated once per container.
//!    It is the only key that ever touches the payload and is stored
//!    wrapped by the master key.
//!
//! This architecture allows registering and removing identities without
//! re-encrypting the payload.

mod cipher;
mod error;
mod kdf;
pub mod wrap;

pub use cipher::{decrypt, encrypt, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key, KdfParams, Salt, SymmetricKey, KEY_SIZE, SALT_SIZE};
pub use wrap::{PrivateIdentity, PublicIdentity};
