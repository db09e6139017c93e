//! Host manifest types (`hosts/<name>.yaml`).

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::module::HookDecl;
use crate::error::{DeklError, DeklResult};
use crate::paths::Layout;

/// Package frontend used for installs, removals and upgrades.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AurHelper {
    #[default]
    Paru,
    Yay,
    /// No AUR helper; official repositories only.
    Pacman,
}

impl AurHelper {
    /// Helpers that can be bootstrapped from the AUR.
    pub const BOOTSTRAPPABLE: [AurHelper; 2] = [AurHelper::Paru, AurHelper::Yay];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paru => "paru",
            Self::Yay => "yay",
            Self::Pacman => "pacman",
        }
    }

    /// Whether this frontend needs `sudo` in front of mutating commands.
    ///
    /// paru and yay escalate on their own; pacman does not.
    pub fn needs_sudo(&self) -> bool {
        matches!(self, Self::Pacman)
    }
}

impl fmt::Display for AurHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-level lifecycle hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HostHooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_sync: Option<HookDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_sync: Option<HookDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_update: Option<HookDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_update: Option<HookDecl>,
}

impl HostHooks {
    pub fn is_empty(&self) -> bool {
        self.pre_sync.is_none()
            && self.post_sync.is_none()
            && self.pre_update.is_none()
            && self.post_update.is_none()
    }
}

fn default_true() -> bool {
    true
}

/// A host file: the machine's ordered module selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HostManifest {
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub aur_helper: AurHelper,
    /// Remove explicitly installed packages that no module declares.
    #[serde(default = "default_true")]
    pub auto_prune: bool,
    #[serde(default, skip_serializing_if = "HostHooks::is_empty")]
    pub hooks: HostHooks,
}

impl Default for HostManifest {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            aur_helper: AurHelper::default(),
            auto_prune: true,
            hooks: HostHooks::default(),
        }
    }
}

impl HostManifest {
    /// Load `hosts/<name>.yaml`.
    pub fn load(layout: &Layout, name: &str) -> DeklResult<Self> {
        let path = layout.host_file(name);
        if !path.exists() {
            return Err(DeklError::HostNotFound { path });
        }
        super::read_yaml(&path)
    }

    pub fn save(&self, layout: &Layout, name: &str) -> anyhow::Result<()> {
        super::write_yaml(&layout.host_file(name), self)
    }

    /// Effective prune mode: a CLI override wins over `auto_prune`.
    pub fn prune_enabled(&self, prune_override: Option<bool>) -> bool {
        prune_override.unwrap_or(self.auto_prune)
    }

    /// Add a module to the selection. Returns false if already present.
    pub fn activate(&mut self, module: &str) -> bool {
        if self.modules.iter().any(|m| m == module) {
            return false;
        }
        self.modules.push(module.to_string());
        true
    }

    /// Remove a module from the selection. Returns false if it was not active.
    pub fn deactivate(&mut self, module: &str) -> bool {
        let before = self.modules.len();
        self.modules.retain(|m| m != module);
        self.modules.len() < before
    }
}
