//! Manifest types for dekl.
//!
//! These structs mirror the YAML files under the configuration directory.
//! They keep the shapes users write (bare strings or objects); normalization
//! into engine types happens in [`crate::resolve`].

pub mod config;
pub mod host;
pub mod module;

pub use config::*;
pub use host::*;
pub use module::*;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::error::{DeklError, DeklResult};

/// Read and parse a YAML file.
///
/// An empty file parses as `T::default()`, matching how a freshly created
/// manifest behaves.
pub fn read_yaml<T: DeserializeOwned + Default>(path: &Path) -> DeklResult<T> {
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(&content).map_err(|e| DeklError::InvalidConfig {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Serialize a value to YAML and write it, creating parent directories.
pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let content = serde_yaml::to_string(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
