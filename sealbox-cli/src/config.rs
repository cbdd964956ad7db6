//! Per-file CLI defaults.
//!
//! `~/.config/sealbox/config.json` maps container paths to the private
//! key and auth id to use for them. The CLI resolves these explicitly
//! and passes the values into registry and session calls; nothing below
//! the CLI ever consults ambient process state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Whole configuration file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Container path -> defaults for that file.
    #[serde(default)]
    pub files: BTreeMap<String, FileDefaults>,
}

/// Defaults for one container file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileDefaults {
    /// Private key file used to unlock this container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PathBuf>,

    /// Auth id registered for this container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_id: Option<String>,
}

impl Config {
    /// Default config location (`~/.config/sealbox/config.json`).
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".config/sealbox/config.json"))
    }

    /// Loads the config; a missing file is an empty config.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    /// Defaults for a container, matched by the path as given or by its
    /// canonical form.
    pub fn for_file(&self, container: &Path) -> FileDefaults {
        if let Some(defaults) = self.files.get(&container.display().to_string()) {
            return defaults.clone();
        }
        if let Ok(canonical) = fs::canonicalize(container) {
            if let Some(defaults) = self.files.get(&canonical.display().to_string()) {
                return defaults.clone();
            }
        }
        FileDefaults::default()
    }
}
