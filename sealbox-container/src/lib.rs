//! Envelope-encryption container engine for sealbox.
//!
//! A container is a single versioned file holding one encrypted payload,
//! decryptable either with a master password or with any registered SSH
//! identity. The payload is encrypted under a random *master data key*,
//! which is itself stored wrapped by the password-derived *master key* -
//! so registering or removing an identity never re-encrypts the payload.
//!
//! Layers:
//! - [`ContainerEngine`]: create/read/write against one storage support
//! - [`IdentityRegistry`]: multi-identity access on top of the engine
//! - [`StorageSupport`]: pluggable on-disk encoding (JSON or packed CBOR)
//! - [`authsign`]: optional signature guard over the auth section

pub mod authsign;
mod engine;
mod error;
mod format;
mod registry;
mod storage;

pub use engine::{ContainerEngine, CHALLENGE_SIZE};
pub use error::{ContainerError, ContainerResult};
pub use format::{AuthSection, Container, IdentityRecord, SshIdentity, CONTAINER_VERSION};
pub use registry::IdentityRegistry;
pub use storage::{open_support, JsonSupport, PackedSupport, StorageFormat, StorageSupport};
