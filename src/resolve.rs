//! Module resolution.
//!
//! Folds a host's ordered module list into one [`DeclaredState`]:
//!
//! - packages: set union, with the declaring modules kept as provenance
//! - services: keyed by (unit, scope); a later module overrides an earlier one
//! - dotfiles and hooks: kept per module, never merged

use clap::ValueEnum;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use crate::error::{DeklError, DeklResult};
use crate::hooks::{Hook, HookId, HookPhase};
use crate::manifest::{DotfilesDecl, HookDecl, HostManifest, ModuleManifest, RootConfig};
use crate::paths::Layout;

/// Which systemd instance manages a unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ServiceScope {
    #[default]
    System,
    User,
}

impl ServiceScope {
    pub fn from_user_flag(user: bool) -> Self {
        if user { Self::User } else { Self::System }
    }
}

impl fmt::Display for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::User => f.write_str("user"),
        }
    }
}

/// A normalized service declaration. Identity is `(name, scope)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSpec {
    pub name: String,
    pub scope: ServiceScope,
    pub enabled: bool,
    /// Module whose declaration won.
    pub module: String,
}

impl ServiceSpec {
    pub fn key(&self) -> ServiceKey {
        ServiceKey {
            name: self.name.clone(),
            scope: self.scope,
        }
    }

    /// `sshd.service` or `pipewire.service (user)`.
    pub fn label(&self) -> String {
        self.key().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ServiceKey {
    pub name: String,
    pub scope: ServiceScope,
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            ServiceScope::System => f.write_str(&self.name),
            ServiceScope::User => write!(f, "{} (user)", self.name),
        }
    }
}

/// A module's dotfile declaration together with where its sources live.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDotfiles {
    pub module: String,
    pub decl: Option<DotfilesDecl>,
    pub source_dir: PathBuf,
}

/// The union of every selected module's intent.
#[derive(Debug, Clone, Default)]
pub struct DeclaredState {
    /// Module names in host order.
    pub modules: Vec<String>,
    /// Package → modules that declare it.
    pub packages: BTreeMap<String, Vec<String>>,
    pub services: BTreeMap<ServiceKey, ServiceSpec>,
    pub dotfiles: Vec<ModuleDotfiles>,
    /// Module hooks in host order followed by host hooks.
    pub hooks: Vec<Hook>,
    /// Non-fatal configuration problems found while resolving.
    pub warnings: Vec<String>,
}

impl DeclaredState {
    pub fn package_set(&self) -> BTreeSet<String> {
        self.packages.keys().cloned().collect()
    }

    /// Modules that declare a package.
    pub fn provenance(&self, package: &str) -> &[String] {
        self.packages
            .get(package)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn hook(&self, id: &HookId) -> Option<&Hook> {
        self.hooks.iter().find(|h| &h.id == id)
    }

    /// Module hooks for a phase, in host module order.
    pub fn module_hooks(&self, phase: HookPhase) -> impl Iterator<Item = &Hook> {
        self.modules.iter().filter_map(move |module| {
            self.hooks
                .iter()
                .find(|h| h.id == HookId::module(module.as_str(), phase))
        })
    }
}

/// The active host: its name and manifest.
#[derive(Debug, Clone)]
pub struct HostContext {
    pub name: String,
    pub manifest: HostManifest,
}

impl HostContext {
    /// Read `config.yaml` and the host file it names.
    pub fn load(layout: &Layout) -> DeklResult<Self> {
        let config = RootConfig::load(layout)?;
        let name = config.host_name()?.to_string();
        let manifest = HostManifest::load(layout, &name)?;
        Ok(Self { name, manifest })
    }

    pub fn save(&self, layout: &Layout) -> anyhow::Result<()> {
        self.manifest.save(layout, &self.name)
    }
}

/// Modules the host selects that have no `module.yaml`.
pub fn missing_modules(layout: &Layout, host: &HostManifest) -> Vec<String> {
    host.modules
        .iter()
        .filter(|m| !layout.module_file(m).exists())
        .cloned()
        .collect()
}

/// Load every module the host selects.
pub fn load_modules(
    layout: &Layout,
    host: &HostManifest,
) -> DeklResult<BTreeMap<String, ModuleManifest>> {
    let mut modules = BTreeMap::new();
    for name in &host.modules {
        if !modules.contains_key(name) {
            modules.insert(name.clone(), ModuleManifest::load(layout, name)?);
        }
    }
    Ok(modules)
}

/// Load the host and its modules from disk and resolve them.
pub fn load_declared(layout: &Layout) -> DeklResult<(HostContext, DeclaredState)> {
    let host = HostContext::load(layout)?;
    let modules = load_modules(layout, &host.manifest)?;
    let declared = resolve(layout, &host.manifest, &modules)?;
    Ok((host, declared))
}

/// Fold the host's modules, in order, into a [`DeclaredState`].
pub fn resolve(
    layout: &Layout,
    host: &HostManifest,
    available: &BTreeMap<String, ModuleManifest>,
) -> DeklResult<DeclaredState> {
    let mut state = DeclaredState::default();

    for name in &host.modules {
        let module = available
            .get(name)
            .ok_or_else(|| DeklError::ModuleNotFound { name: name.clone() })?;

        if state.modules.contains(name) {
            tracing::warn!(module = %name, "Module listed twice in host config");
            state
                .warnings
                .push(format!("Module '{name}' is listed more than once"));
            continue;
        }
        state.modules.push(name.clone());

        for package in &module.packages {
            let owners = state.packages.entry(package.clone()).or_default();
            if !owners.contains(name) {
                owners.push(name.clone());
            }
        }

        for entry in &module.services {
            let spec = ServiceSpec {
                name: entry.unit_name(),
                scope: ServiceScope::from_user_flag(entry.is_user()),
                enabled: entry.is_enabled(),
                module: name.clone(),
            };
            if let Some(previous) = state.services.insert(spec.key(), spec.clone())
                && previous.enabled != spec.enabled
            {
                tracing::warn!(
                    service = %spec.label(),
                    earlier = %previous.module,
                    later = %spec.module,
                    "Conflicting service declarations; later module wins"
                );
                state.warnings.push(format!(
                    "Service {} is {} in '{}' but {} in '{}'; using '{}'",
                    spec.label(),
                    enabled_word(previous.enabled),
                    previous.module,
                    enabled_word(spec.enabled),
                    spec.module,
                    spec.module,
                ));
            }
        }

        let source_dir = layout.dotfiles_dir(name);
        if module.dotfiles.is_none() && source_dir.is_dir() {
            state.warnings.push(format!(
                "Module '{name}' has dotfiles/ but no dotfiles declaration"
            ));
        }
        state.dotfiles.push(ModuleDotfiles {
            module: name.clone(),
            decl: module.dotfiles.clone(),
            source_dir,
        });

        let module_dir = layout.module_dir(name);
        for (phase, decl) in [
            (HookPhase::Pre, &module.hooks.pre),
            (HookPhase::Post, &module.hooks.post),
        ] {
            if let Some(decl) = decl {
                let id = HookId::module(name.as_str(), phase);
                push_hook(&mut state, id, decl, &module_dir);
            }
        }
    }

    let hooks = &host.hooks;
    for (phase, decl) in [
        (HookPhase::PreSync, &hooks.pre_sync),
        (HookPhase::PostSync, &hooks.post_sync),
        (HookPhase::PreUpdate, &hooks.pre_update),
        (HookPhase::PostUpdate, &hooks.post_update),
    ] {
        if let Some(decl) = decl {
            push_hook(&mut state, HookId::host(phase), decl, layout.root());
        }
    }

    Ok(state)
}

fn push_hook(state: &mut DeclaredState, id: HookId, decl: &HookDecl, base: &std::path::Path) {
    let script = base.join(decl.script());
    if !script.is_file() {
        tracing::warn!(hook = %id, script = %script.display(), "Hook script not found");
        state
            .warnings
            .push(format!("Hook {id} script not found: {}", script.display()));
        return;
    }
    state.hooks.push(Hook {
        id,
        script,
        always: decl.always(),
        root: decl.root(),
    });
}

fn enabled_word(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ServiceEntry;
    use std::fs;

    fn host(modules: &[&str]) -> HostManifest {
        HostManifest {
            modules: modules.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        }
    }

    fn module(packages: &[&str], services: Vec<ServiceEntry>) -> ModuleManifest {
        ModuleManifest {
            packages: packages.iter().map(|p| p.to_string()).collect(),
            services,
            ..Default::default()
        }
    }

    fn layout() -> Layout {
        Layout::new("/nonexistent/cfg", "/home/me")
    }

    #[test]
    fn test_missing_module_fails() {
        let available = BTreeMap::from([("base".to_string(), module(&["base"], vec![]))]);
        let err = resolve(&layout(), &host(&["base", "ghost"]), &available).unwrap_err();
        assert!(matches!(err, DeklError::ModuleNotFound { ref name } if name == "ghost"));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_packages_union_with_provenance() {
        let available = BTreeMap::from([
            ("base".to_string(), module(&["git", "vim"], vec![])),
            ("dev".to_string(), module(&["git", "rustup"], vec![])),
        ]);
        let state = resolve(&layout(), &host(&["base", "dev"]), &available).unwrap();

        assert_eq!(
            state.package_set(),
            BTreeSet::from(["git".into(), "rustup".into(), "vim".into()])
        );
        assert_eq!(state.provenance("git"), ["base", "dev"]);
        assert_eq!(state.provenance("rustup"), ["dev"]);
        assert!(state.provenance("htop").is_empty());
    }

    #[test]
    fn test_service_last_module_wins_with_warning() {
        let available = BTreeMap::from([
            (
                "base".to_string(),
                module(&[], vec![ServiceEntry::Name("bluetooth".into())]),
            ),
            (
                "laptop".to_string(),
                module(&[], vec![ServiceEntry::new("bluetooth", false, false)]),
            ),
        ]);
        let state = resolve(&layout(), &host(&["base", "laptop"]), &available).unwrap();

        let key = ServiceKey {
            name: "bluetooth.service".into(),
            scope: ServiceScope::System,
        };
        let spec = &state.services[&key];
        assert!(!spec.enabled);
        assert_eq!(spec.module, "laptop");
        assert_eq!(state.warnings.len(), 1);
        assert!(state.warnings[0].contains("bluetooth.service"));

        // Reversed order flips the winner.
        let state = resolve(&layout(), &host(&["laptop", "base"]), &available).unwrap();
        assert!(state.services[&key].enabled);
    }

    #[test]
    fn test_service_scopes_are_distinct_identities() {
        let available = BTreeMap::from([(
            "audio".to_string(),
            module(
                &[],
                vec![
                    ServiceEntry::Name("pipewire".into()),
                    ServiceEntry::new("pipewire", true, true),
                ],
            ),
        )]);
        let state = resolve(&layout(), &host(&["audio"]), &available).unwrap();
        assert_eq!(state.services.len(), 2);
        assert!(state.warnings.is_empty());
    }

    #[test]
    fn test_hooks_resolve_relative_to_module_and_host() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());
        fs::create_dir_all(layout.module_dir("neovim").join("scripts")).unwrap();
        fs::write(layout.module_dir("neovim").join("scripts/post.sh"), "true").unwrap();
        fs::create_dir_all(dir.path().join("hooks")).unwrap();
        fs::write(dir.path().join("hooks/pre.sh"), "true").unwrap();

        let neovim: ModuleManifest = serde_yaml::from_str(
            "hooks:\n  pre: scripts/missing.sh\n  post:\n    script: scripts/post.sh\n    always: true\n",
        )
        .unwrap();
        let mut host = host(&["neovim"]);
        host.hooks.pre_sync = Some(HookDecl::Script("hooks/pre.sh".into()));

        let available = BTreeMap::from([("neovim".to_string(), neovim)]);
        let state = resolve(&layout, &host, &available).unwrap();

        let post = state
            .hook(&HookId::module("neovim", HookPhase::Post))
            .unwrap();
        assert!(post.always);
        assert_eq!(post.script, layout.module_dir("neovim").join("scripts/post.sh"));

        assert!(state.hook(&HookId::host(HookPhase::PreSync)).is_some());
        assert!(state.hook(&HookId::module("neovim", HookPhase::Pre)).is_none());
        assert!(state.warnings.iter().any(|w| w.contains("missing.sh")));
    }

    #[test]
    fn test_module_hooks_follow_host_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());
        let mut available = BTreeMap::new();
        for name in ["zsh", "alpha"] {
            fs::create_dir_all(layout.module_dir(name)).unwrap();
            fs::write(layout.module_dir(name).join("pre.sh"), "true").unwrap();
            let m: ModuleManifest = serde_yaml::from_str("hooks:\n  pre: pre.sh\n").unwrap();
            available.insert(name.to_string(), m);
        }

        let state = resolve(&layout, &host(&["zsh", "alpha"]), &available).unwrap();
        let order: Vec<String> = state
            .module_hooks(HookPhase::Pre)
            .map(|h| h.id.to_string())
            .collect();
        assert_eq!(order, vec!["zsh:pre", "alpha:pre"]);
    }

    #[test]
    fn test_load_declared_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());
        fs::write(layout.config_file(), "host: box\n").unwrap();
        fs::create_dir_all(layout.hosts_dir()).unwrap();
        fs::write(layout.host_file("box"), "modules: [base]\n").unwrap();
        fs::create_dir_all(layout.module_dir("base")).unwrap();
        fs::write(layout.module_file("base"), "packages: [base, git]\n").unwrap();

        let (host, declared) = load_declared(&layout).unwrap();
        assert_eq!(host.name, "box");
        assert_eq!(declared.packages.len(), 2);
        assert!(missing_modules(&layout, &host.manifest).is_empty());
    }
}
