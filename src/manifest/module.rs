//! Module manifest types (`modules/<name>/module.yaml`).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{DeklError, DeklResult};
use crate::paths::Layout;

/// Unit suffixes that are left untouched by [`normalize_service_name`].
const UNIT_SUFFIXES: [&str; 3] = [".service", ".socket", ".timer"];

/// Append `.service` to a unit name that has no recognised suffix.
pub fn normalize_service_name(name: &str) -> String {
    if UNIT_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        name.to_string()
    } else {
        format!("{name}.service")
    }
}

fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// A service declaration as written: `sshd` or `{name, user, enabled}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ServiceEntry {
    Name(String),
    Detailed {
        name: String,
        /// Manage with `systemctl --user`.
        #[serde(default, skip_serializing_if = "is_false")]
        user: bool,
        #[serde(default = "default_true", skip_serializing_if = "is_true")]
        enabled: bool,
    },
}

impl ServiceEntry {
    pub fn raw_name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Detailed { name, .. } => name,
        }
    }

    /// Unit name with the `.service` default applied.
    pub fn unit_name(&self) -> String {
        normalize_service_name(self.raw_name())
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::Detailed { user: true, .. })
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Name(_) => true,
            Self::Detailed { enabled, .. } => *enabled,
        }
    }

    /// Build the shortest entry that expresses the given settings.
    pub fn new(name: &str, user: bool, enabled: bool) -> Self {
        if !user && enabled {
            Self::Name(name.to_string())
        } else {
            Self::Detailed {
                name: name.to_string(),
                user,
                enabled,
            }
        }
    }
}

/// The `dotfiles:` key: `true`, `false`, or an explicit `source: target` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum DotfilesDecl {
    Flag(bool),
    Map(BTreeMap<String, String>),
}

/// A hook declaration: a script path, or a script with flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum HookDecl {
    Script(String),
    Detailed {
        script: String,
        /// Run on every pass instead of once.
        #[serde(default, skip_serializing_if = "is_false")]
        always: bool,
        /// Run with elevated privileges.
        #[serde(default, skip_serializing_if = "is_false")]
        root: bool,
    },
}

impl HookDecl {
    pub fn script(&self) -> &str {
        match self {
            Self::Script(script) => script,
            Self::Detailed { script, .. } => script,
        }
    }

    pub fn always(&self) -> bool {
        matches!(self, Self::Detailed { always: true, .. })
    }

    pub fn root(&self) -> bool {
        matches!(self, Self::Detailed { root: true, .. })
    }
}

/// Module-level hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModuleHooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre: Option<HookDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<HookDecl>,
}

impl ModuleHooks {
    pub fn is_empty(&self) -> bool {
        self.pre.is_none() && self.post.is_none()
    }
}

/// A `module.yaml` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModuleManifest {
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dotfiles: Option<DotfilesDecl>,
    #[serde(default, skip_serializing_if = "ModuleHooks::is_empty")]
    pub hooks: ModuleHooks,
}

impl ModuleManifest {
    /// Load `modules/<name>/module.yaml`.
    pub fn load(layout: &Layout, name: &str) -> DeklResult<Self> {
        let path = layout.module_file(name);
        if !path.exists() {
            return Err(DeklError::ModuleNotFound {
                name: name.to_string(),
            });
        }
        super::read_yaml(&path)
    }

    /// Load a module, or an empty one if it does not exist yet.
    pub fn load_or_default(layout: &Layout, name: &str) -> DeklResult<Self> {
        match Self::load(layout, name) {
            Err(DeklError::ModuleNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, layout: &Layout, name: &str) -> anyhow::Result<()> {
        super::write_yaml(&layout.module_file(name), self)
    }

    pub fn has_package(&self, package: &str) -> bool {
        self.packages.iter().any(|p| p == package)
    }

    /// Add a package. Returns false if it was already declared.
    pub fn add_package(&mut self, package: &str) -> bool {
        if self.has_package(package) {
            return false;
        }
        self.packages.push(package.to_string());
        true
    }

    /// Remove a package. Returns true if it was declared.
    pub fn remove_package(&mut self, package: &str) -> bool {
        let before = self.packages.len();
        self.packages.retain(|p| p != package);
        self.packages.len() < before
    }

    /// Index of the service entry whose normalized name matches `unit`.
    pub fn find_service(&self, unit: &str) -> Option<usize> {
        let unit = normalize_service_name(unit);
        self.services.iter().position(|s| s.unit_name() == unit)
    }

    /// Number of dotfile entries for listings: map size, 1 for `true`.
    pub fn dotfile_count(&self) -> usize {
        match &self.dotfiles {
            Some(DotfilesDecl::Map(map)) => map.len(),
            Some(DotfilesDecl::Flag(true)) => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_service_name() {
        assert_eq!(normalize_service_name("sshd"), "sshd.service");
        assert_eq!(normalize_service_name("sshd.service"), "sshd.service");
        assert_eq!(normalize_service_name("fstrim.timer"), "fstrim.timer");
        assert_eq!(normalize_service_name("cups.socket"), "cups.socket");
    }

    #[test]
    fn test_parse_module() {
        let yaml = r#"
packages: [neovim, ripgrep]
services:
  - sshd
  - name: pipewire
    user: true
  - name: bluetooth
    enabled: false
dotfiles:
  nvim/: ~/.config/nvim
  zshrc: ~/.zshrc
hooks:
  pre: scripts/pre.sh
  post:
    script: scripts/post.sh
    root: true
"#;
        let module: ModuleManifest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(module.packages.len(), 2);

        assert_eq!(module.services[0], ServiceEntry::Name("sshd".into()));
        assert!(module.services[1].is_user());
        assert!(module.services[1].is_enabled());
        assert!(!module.services[2].is_enabled());
        assert!(!module.services[2].is_user());

        match module.dotfiles.as_ref().unwrap() {
            DotfilesDecl::Map(map) => {
                assert_eq!(map.get("nvim/").unwrap(), "~/.config/nvim");
                assert_eq!(map.len(), 2);
            }
            other => panic!("expected map, got {other:?}"),
        }

        assert_eq!(module.hooks.pre.as_ref().unwrap().script(), "scripts/pre.sh");
        assert!(!module.hooks.pre.as_ref().unwrap().root());
        assert!(module.hooks.post.as_ref().unwrap().root());
        assert!(!module.hooks.post.as_ref().unwrap().always());
    }

    #[test]
    fn test_dotfiles_flag() {
        let module: ModuleManifest = serde_yaml::from_str("dotfiles: true\n").unwrap();
        assert_eq!(module.dotfiles, Some(DotfilesDecl::Flag(true)));
        assert_eq!(module.dotfile_count(), 1);

        let module: ModuleManifest = serde_yaml::from_str("dotfiles: false\n").unwrap();
        assert_eq!(module.dotfiles, Some(DotfilesDecl::Flag(false)));
        assert_eq!(module.dotfile_count(), 0);
    }

    #[test]
    fn test_service_entry_new_is_minimal() {
        assert_eq!(
            ServiceEntry::new("sshd", false, true),
            ServiceEntry::Name("sshd".into())
        );
        let yaml = serde_yaml::to_string(&ServiceEntry::new("sshd", false, false)).unwrap();
        assert!(yaml.contains("enabled: false"));
        assert!(!yaml.contains("user"));
    }

    #[test]
    fn test_package_editing() {
        let mut module = ModuleManifest::default();
        assert!(module.add_package("git"));
        assert!(!module.add_package("git"));
        assert!(module.remove_package("git"));
        assert!(!module.remove_package("git"));
    }

    #[test]
    fn test_find_service_normalizes() {
        let module = ModuleManifest {
            services: vec![
                ServiceEntry::Name("sshd".into()),
                ServiceEntry::new("pipewire.service", true, true),
            ],
            ..Default::default()
        };
        assert_eq!(module.find_service("sshd.service"), Some(0));
        assert_eq!(module.find_service("pipewire"), Some(1));
        assert_eq!(module.find_service("cups"), None);
    }
}
