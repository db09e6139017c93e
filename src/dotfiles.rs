//! Dotfile planner.
//!
//! Turns each module's `dotfiles:` declaration into symlink intents, rejects
//! targets claimed twice, and compares the intents with what is on disk.
//!
//! Real files and directories at a target are never touched. Removal only
//! considers links dekl itself recorded in the state store.

use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DeklError, DeklResult};
use crate::manifest::DotfilesDecl;
use crate::paths::Layout;
use crate::resolve::ModuleDotfiles;
use crate::system::{LinkState, SymlinkManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A symlink some module wants: `target -> source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkIntent {
    pub module: String,
    pub source: PathBuf,
    pub target: PathBuf,
    pub kind: EntryKind,
}

impl LinkIntent {
    /// `zshrc -> /home/me/.config/zshrc`
    pub fn label(&self) -> String {
        let name = self
            .source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let slash = if self.kind == EntryKind::Directory { "/" } else { "" };
        format!("{name}{slash} -> {}", self.target.display())
    }
}

/// Every intent of the selected modules, conflict-free.
#[derive(Debug, Clone, Default)]
pub struct Intents {
    pub links: Vec<LinkIntent>,
    pub warnings: Vec<String>,
}

/// Resolve declarations into intents, in host module order.
pub fn collect_intents(layout: &Layout, modules: &[ModuleDotfiles]) -> DeklResult<Intents> {
    let mut intents = Intents::default();
    let mut claimed: BTreeMap<PathBuf, String> = BTreeMap::new();

    for module in modules {
        for intent in module_intents(layout, module, &mut intents.warnings)? {
            if let Some(first) = claimed.get(&intent.target) {
                return Err(DeklError::DotfileConflict {
                    target: intent.target,
                    first: first.clone(),
                    second: intent.module,
                });
            }
            claimed.insert(intent.target.clone(), intent.module.clone());
            intents.links.push(intent);
        }
    }
    Ok(intents)
}

fn kind_of(path: &Path) -> EntryKind {
    if path.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    }
}

fn module_intents(
    layout: &Layout,
    module: &ModuleDotfiles,
    warnings: &mut Vec<String>,
) -> DeklResult<Vec<LinkIntent>> {
    let name = &module.module;
    let decl = match &module.decl {
        None | Some(DotfilesDecl::Flag(false)) => return Ok(Vec::new()),
        Some(decl) => decl,
    };

    if !module.source_dir.is_dir() {
        tracing::warn!(module = %name, "dotfiles declared without a dotfiles/ directory");
        warnings.push(format!(
            "Module '{name}' declares dotfiles but has no dotfiles/ directory"
        ));
        return Ok(Vec::new());
    }

    let mut links = Vec::new();
    match decl {
        DotfilesDecl::Flag(_) => {
            let mut entries: Vec<PathBuf> = fs::read_dir(&module.source_dir)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .collect();
            entries.sort();
            let config_home = layout.xdg_config_home();
            for source in entries {
                let Some(file_name) = source.file_name() else {
                    continue;
                };
                links.push(LinkIntent {
                    module: name.clone(),
                    target: config_home.join(file_name),
                    kind: kind_of(&source),
                    source,
                });
            }
        }
        DotfilesDecl::Map(map) => {
            for (key, target) in map {
                let wants_dir = key.ends_with('/');
                let source = module.source_dir.join(key.trim_end_matches('/'));
                if !source.exists() {
                    warnings.push(format!(
                        "Module '{name}' dotfile not found: {}",
                        source.display()
                    ));
                    continue;
                }
                if wants_dir && !source.is_dir() {
                    warnings.push(format!(
                        "Module '{name}' dotfile '{key}' has a trailing slash but is not a directory"
                    ));
                    continue;
                }
                links.push(LinkIntent {
                    module: name.clone(),
                    target: layout.expand_target(target),
                    kind: kind_of(&source),
                    source,
                });
            }
        }
    }
    Ok(links)
}

/// A target holding a real file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedLink {
    pub intent: LinkIntent,
    pub existing: EntryKind,
}

/// A link pointing somewhere other than the intended source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Retarget {
    pub intent: LinkIntent,
    pub current: PathBuf,
}

/// A dekl-created link that no module claims any more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleLink {
    pub target: PathBuf,
    pub source: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DotfilePlan {
    pub create: Vec<LinkIntent>,
    pub replace: Vec<Retarget>,
    pub unchanged: Vec<LinkIntent>,
    pub blocked: Vec<BlockedLink>,
    pub remove: Vec<StaleLink>,
    /// Recorded targets that are gone or were changed by hand; their records
    /// are dropped without touching the filesystem.
    #[serde(skip)]
    pub forget: Vec<PathBuf>,
}

impl DotfilePlan {
    /// No filesystem mutation is needed.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.replace.is_empty() && self.remove.is_empty()
    }

    pub fn total(&self) -> usize {
        self.create.len()
            + self.replace.len()
            + self.unchanged.len()
            + self.blocked.len()
    }
}

/// Classify each intent against the live filesystem.
pub fn diff_links(
    intents: &[LinkIntent],
    links: &dyn SymlinkManager,
    recorded: &BTreeMap<PathBuf, PathBuf>,
) -> Result<DotfilePlan> {
    let mut plan = DotfilePlan::default();

    for intent in intents {
        match links.inspect(&intent.target)? {
            LinkState::Absent => plan.create.push(intent.clone()),
            LinkState::Symlink(current) if current == intent.source => {
                plan.unchanged.push(intent.clone())
            }
            LinkState::Symlink(current) => plan.replace.push(Retarget {
                intent: intent.clone(),
                current,
            }),
            LinkState::File => plan.blocked.push(BlockedLink {
                intent: intent.clone(),
                existing: EntryKind::File,
            }),
            LinkState::Directory => plan.blocked.push(BlockedLink {
                intent: intent.clone(),
                existing: EntryKind::Directory,
            }),
        }
    }

    let wanted: BTreeSet<&Path> = intents.iter().map(|i| i.target.as_path()).collect();
    for (target, source) in recorded {
        if wanted.contains(target.as_path()) {
            continue;
        }
        match links.inspect(target)? {
            LinkState::Symlink(current) if &current == source => plan.remove.push(StaleLink {
                target: target.clone(),
                source: source.clone(),
            }),
            _ => plan.forget.push(target.clone()),
        }
    }

    Ok(plan)
}

/// Collect intents and diff them in one step.
pub fn plan(
    layout: &Layout,
    modules: &[ModuleDotfiles],
    links: &dyn SymlinkManager,
    recorded: &BTreeMap<PathBuf, PathBuf>,
) -> Result<(DotfilePlan, Vec<String>)> {
    let intents = collect_intents(layout, modules)?;
    let plan = diff_links(&intents.links, links, recorded)?;
    Ok((plan, intents.warnings))
}
