//! Persisted run state (`state.yaml`).
//!
//! The store is loaded once per invocation, threaded through the run as a
//! plain value, and written back once at the end. Nothing in here touches the
//! disk except [`HookStore::load`] and [`HookStore::save`].

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::DeklResult;
use crate::hooks::{HookId, HookScope};
use crate::manifest;

/// Marker that a hook has completed successfully at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookRecord {
    pub ran_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StateFile {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    hooks: BTreeMap<String, HookRecord>,
    /// Symlinks dekl created: target → source.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    links: BTreeMap<PathBuf, PathBuf>,
}

/// In-memory view of `state.yaml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookStore {
    hooks: BTreeMap<HookId, HookRecord>,
    links: BTreeMap<PathBuf, PathBuf>,
    dirty: bool,
}

impl HookStore {
    /// Load the store; a missing file is an empty store.
    pub fn load(path: &Path) -> DeklResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file: StateFile = manifest::read_yaml(path)?;
        let mut hooks = BTreeMap::new();
        for (key, record) in file.hooks {
            match key.parse::<HookId>() {
                Ok(id) => {
                    hooks.insert(id, record);
                }
                Err(_) => tracing::warn!(key, "Ignoring unrecognised hook key in state file"),
            }
        }
        Ok(Self {
            hooks,
            links: file.links,
            dirty: false,
        })
    }

    /// Write the store back if anything changed.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let file = StateFile {
            hooks: self
                .hooks
                .iter()
                .map(|(id, record)| (id.to_string(), record.clone()))
                .collect(),
            links: self.links.clone(),
        };
        manifest::write_yaml(path, &file)?;
        self.dirty = false;
        tracing::debug!(path = %path.display(), "Saved state");
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn hook_record(&self, id: &HookId) -> Option<&HookRecord> {
        self.hooks.get(id)
    }

    pub fn has_run(&self, id: &HookId) -> bool {
        self.hooks.contains_key(id)
    }

    pub fn mark_ran(&mut self, id: &HookId) {
        self.hooks.insert(id.clone(), HookRecord { ran_at: Utc::now() });
        self.dirty = true;
    }

    /// Forget a hook's history. Returns true if a record existed.
    pub fn clear_hook(&mut self, id: &HookId) -> bool {
        let removed = self.hooks.remove(id).is_some();
        self.dirty |= removed;
        removed
    }

    /// Forget every hook recorded under a scope. Returns the cleared ids.
    pub fn clear_scope(&mut self, scope: &HookScope) -> Vec<HookId> {
        let ids: Vec<HookId> = self
            .hooks
            .keys()
            .filter(|id| &id.scope == scope)
            .cloned()
            .collect();
        for id in &ids {
            self.hooks.remove(id);
        }
        self.dirty |= !ids.is_empty();
        ids
    }

    /// Symlinks dekl created on earlier runs.
    pub fn links(&self) -> &BTreeMap<PathBuf, PathBuf> {
        &self.links
    }

    pub fn record_link(&mut self, target: &Path, source: &Path) {
        if self.links.get(target).map(PathBuf::as_path) != Some(source) {
            self.links.insert(target.to_path_buf(), source.to_path_buf());
            self.dirty = true;
        }
    }

    pub fn forget_link(&mut self, target: &Path) {
        if self.links.remove(target).is_some() {
            self.dirty = true;
        }
    }
}
