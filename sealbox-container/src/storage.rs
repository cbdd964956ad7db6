//! Storage support collaborators.
//!
//! A [`StorageSupport`] just (de)serializes the container mapping to and
//! from one file. The concrete encoding is selected once at the boundary
//! (CLI/config) and injected into the engine - the engine never branches
//! on it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ContainerError, ContainerResult};
use crate::format::Container;

/// Abstract load/dump of the container structure.
pub trait StorageSupport: Send + Sync {
    fn load(&self) -> ContainerResult<Container>;
    fn dump(&self, container: &Container) -> ContainerResult<()>;
    fn is_exist(&self) -> bool;
    fn filename(&self) -> &Path;
}

/// Available on-disk encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageFormat {
    /// Human-readable JSON.
    Json,
    /// Packed binary (CBOR).
    Packed,
}

impl std::str::FromStr for StorageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "packed" => Ok(Self::Packed),
            other => Err(format!("unknown storage format: {other}")),
        }
    }
}

/// Builds the storage support for `format` at `path`.
pub fn open_support(path: impl Into<PathBuf>, format: StorageFormat) -> Box<dyn StorageSupport> {
    match format {
        StorageFormat::Json => Box::new(JsonSupport::new(path)),
        StorageFormat::Packed => Box::new(PackedSupport::new(path)),
    }
}

/// JSON container file.
pub struct JsonSupport {
    path: PathBuf,
}

impl JsonSupport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageSupport for JsonSupport {
    fn load(&self) -> ContainerResult<Container> {
        let bytes = fs::read(&self.path)?;
        serde_json::from_slice(&bytes).map_err(|e| ContainerError::Storage(e.to_string()))
    }

    fn dump(&self, container: &Container) -> ContainerResult<()> {
        let bytes =
            serde_json::to_vec(container).map_err(|e| ContainerError::Storage(e.to_string()))?;
        // Written in place (no rename dance) so a watcher on the container
        // path sees a close-after-write for every dump.
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    fn is_exist(&self) -> bool {
        self.path.exists()
    }

    fn filename(&self) -> &Path {
        &self.path
    }
}

/// Packed (CBOR) container file.
pub struct PackedSupport {
    path: PathBuf,
}

impl PackedSupport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageSupport for PackedSupport {
    fn load(&self) -> ContainerResult<Container> {
        let bytes = fs::read(&self.path)?;
        ciborium::from_reader(bytes.as_slice())
            .map_err(|e| ContainerError::Storage(e.to_string()))
    }

    fn dump(&self, container: &Container) -> ContainerResult<()> {
        let mut bytes = Vec::new();
        ciborium::into_writer(container, &mut bytes)
            .map_err(|e| ContainerError::Storage(e.to_string()))?;
        // Same in-place write as JsonSupport, for the same watcher reason.
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    fn is_exist(&self) -> bool {
        self.path.exists()
    }

    fn filename(&self) -> &Path {
        &self.path
    }
}
