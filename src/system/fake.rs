//! In-memory collaborators for engine tests.
//!
//! Each fake is a cheap handle over shared state so a test can box one into
//! a [`System`] and still inspect what happened afterwards.

use anyhow::{Result, bail};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::rc::Rc;

use super::{
    ItemOutcome, LinkState, PackageManager, Prompter, ScriptRunner, ServiceController,
    SymlinkManager, System,
};
use crate::resolve::ServiceScope;

fn strings(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Default)]
struct PackagesInner {
    installed: BTreeSet<String>,
    failing: BTreeSet<String>,
    calls: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakePackages(Rc<RefCell<PackagesInner>>);

impl FakePackages {
    pub fn new(installed: &[&str]) -> Self {
        let fake = Self::default();
        fake.0.borrow_mut().installed = strings(installed);
        fake
    }

    /// Packages whose install or removal fails.
    pub fn failing(self, packages: &[&str]) -> Self {
        self.0.borrow_mut().failing = strings(packages);
        self
    }

    pub fn installed(&self) -> BTreeSet<String> {
        self.0.borrow().installed.clone()
    }

    /// `install a b`, `remove c`, `upgrade`.
    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().calls.clone()
    }
}

impl PackageManager for FakePackages {
    fn explicit_packages(&self) -> Result<BTreeSet<String>> {
        Ok(self.installed())
    }

    fn orphan_packages(&self) -> Result<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }

    fn install(&self, packages: &[String]) -> Vec<ItemOutcome> {
        let mut inner = self.0.borrow_mut();
        inner.calls.push(format!("install {}", packages.join(" ")));
        packages
            .iter()
            .map(|p| {
                if inner.failing.contains(p) {
                    ItemOutcome::failed(p, "target not found")
                } else {
                    inner.installed.insert(p.clone());
                    ItemOutcome::ok(p)
                }
            })
            .collect()
    }

    fn remove(&self, packages: &[String]) -> Vec<ItemOutcome> {
        let mut inner = self.0.borrow_mut();
        inner.calls.push(format!("remove {}", packages.join(" ")));
        packages
            .iter()
            .map(|p| {
                if inner.failing.contains(p) {
                    ItemOutcome::failed(p, "removal failed")
                } else {
                    inner.installed.remove(p);
                    ItemOutcome::ok(p)
                }
            })
            .collect()
    }

    fn upgrade(&self) -> Result<()> {
        self.0.borrow_mut().calls.push("upgrade".to_string());
        Ok(())
    }
}

#[derive(Default)]
struct ServicesInner {
    enabled: BTreeSet<(String, ServiceScope)>,
    failing: BTreeSet<String>,
    calls: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeServices(Rc<RefCell<ServicesInner>>);

impl FakeServices {
    pub fn new(enabled: &[(&str, ServiceScope)]) -> Self {
        let fake = Self::default();
        fake.0.borrow_mut().enabled = enabled
            .iter()
            .map(|(name, scope)| (name.to_string(), *scope))
            .collect();
        fake
    }

    /// Units whose enable or disable fails.
    pub fn failing(self, units: &[&str]) -> Self {
        self.0.borrow_mut().failing = strings(units);
        self
    }

    pub fn is_enabled(&self, unit: &str, scope: ServiceScope) -> bool {
        self.0
            .borrow()
            .enabled
            .contains(&(unit.to_string(), scope))
    }

    /// `enable sshd.service (system)`.
    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().calls.clone()
    }

    fn toggle(&self, verb: &str, unit: &str, scope: ServiceScope, on: bool) -> Result<()> {
        let mut inner = self.0.borrow_mut();
        inner.calls.push(format!("{verb} {unit} ({scope})"));
        if inner.failing.contains(unit) {
            bail!("systemctl {verb} {unit} failed");
        }
        let key = (unit.to_string(), scope);
        if on {
            inner.enabled.insert(key);
        } else {
            inner.enabled.remove(&key);
        }
        Ok(())
    }
}

impl ServiceController for FakeServices {
    fn enabled_units(&self, scope: ServiceScope) -> Result<BTreeSet<String>> {
        Ok(self
            .0
            .borrow()
            .enabled
            .iter()
            .filter(|(_, s)| *s == scope)
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn enable(&self, unit: &str, scope: ServiceScope) -> Result<()> {
        self.toggle("enable", unit, scope, true)
    }

    fn disable(&self, unit: &str, scope: ServiceScope) -> Result<()> {
        self.toggle("disable", unit, scope, false)
    }
}

#[derive(Default)]
struct LinksInner {
    entries: BTreeMap<PathBuf, LinkState>,
    calls: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeLinks(Rc<RefCell<LinksInner>>);

impl FakeLinks {
    /// Seed what sits at a path.
    pub fn with(self, target: impl Into<PathBuf>, state: LinkState) -> Self {
        self.0.borrow_mut().entries.insert(target.into(), state);
        self
    }

    pub fn state(&self, target: impl AsRef<Path>) -> LinkState {
        self.0
            .borrow()
            .entries
            .get(target.as_ref())
            .cloned()
            .unwrap_or(LinkState::Absent)
    }

    /// `create /home/u/.zshrc`, `replace ...`, `remove ...`.
    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().calls.clone()
    }

    fn record(&self, verb: &str, target: &Path) {
        self.0
            .borrow_mut()
            .calls
            .push(format!("{verb} {}", target.display()));
    }
}

impl SymlinkManager for FakeLinks {
    fn inspect(&self, target: &Path) -> Result<LinkState> {
        Ok(self.state(target))
    }

    fn create(&self, target: &Path, source: &Path) -> Result<()> {
        self.record("create", target);
        if self.state(target) != LinkState::Absent {
            bail!("{} already exists", target.display());
        }
        self.0
            .borrow_mut()
            .entries
            .insert(target.to_path_buf(), LinkState::Symlink(source.to_path_buf()));
        Ok(())
    }

    fn replace(&self, target: &Path, source: &Path) -> Result<()> {
        self.record("replace", target);
        if !matches!(self.state(target), LinkState::Symlink(_)) {
            bail!("{} is not a symlink", target.display());
        }
        self.0
            .borrow_mut()
            .entries
            .insert(target.to_path_buf(), LinkState::Symlink(source.to_path_buf()));
        Ok(())
    }

    fn remove(&self, target: &Path) -> Result<()> {
        self.record("remove", target);
        match self.state(target) {
            LinkState::Symlink(_) => {
                self.0.borrow_mut().entries.remove(target);
                Ok(())
            }
            LinkState::Absent => Ok(()),
            _ => bail!("Refusing to remove {}: not a symlink", target.display()),
        }
    }
}

/// One recorded script invocation.
#[derive(Debug, Clone)]
pub struct ScriptRun {
    pub script: PathBuf,
    pub root: bool,
    pub env: Vec<(String, String)>,
}

#[derive(Default)]
struct ScriptsInner {
    failing: BTreeSet<PathBuf>,
    runs: Vec<ScriptRun>,
}

#[derive(Clone, Default)]
pub struct FakeScripts(Rc<RefCell<ScriptsInner>>);

impl FakeScripts {
    /// Scripts at these paths exit with status 1.
    pub fn failing(scripts: &[&str]) -> Self {
        let fake = Self::default();
        fake.0.borrow_mut().failing = scripts.iter().map(PathBuf::from).collect();
        fake
    }

    pub fn runs(&self) -> Vec<ScriptRun> {
        self.0.borrow().runs.clone()
    }

    /// Paths of every script run, in order.
    pub fn scripts(&self) -> Vec<PathBuf> {
        self.runs().into_iter().map(|r| r.script).collect()
    }
}

impl ScriptRunner for FakeScripts {
    fn run(&self, script: &Path, root: bool, env: &[(String, String)]) -> Result<ExitStatus> {
        let mut inner = self.0.borrow_mut();
        inner.runs.push(ScriptRun {
            script: script.to_path_buf(),
            root,
            env: env.to_vec(),
        });
        let code = if inner.failing.contains(script) { 1 } else { 0 };
        Ok(ExitStatus::from_raw(code << 8))
    }
}

#[derive(Default)]
struct PromptInner {
    answer: bool,
    asked: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakePrompt(Rc<RefCell<PromptInner>>);

impl FakePrompt {
    /// A prompter that gives the same answer to every question.
    pub fn answering(answer: bool) -> Self {
        let fake = Self::default();
        fake.0.borrow_mut().answer = answer;
        fake
    }

    pub fn asked(&self) -> Vec<String> {
        self.0.borrow().asked.clone()
    }
}

impl Prompter for FakePrompt {
    fn confirm(&self, message: &str) -> Result<bool> {
        let mut inner = self.0.borrow_mut();
        inner.asked.push(message.to_string());
        Ok(inner.answer)
    }
}

/// Handles to every fake behind a [`System`].
#[derive(Clone, Default)]
pub struct FakeSystem {
    pub packages: FakePackages,
    pub services: FakeServices,
    pub links: FakeLinks,
    pub scripts: FakeScripts,
    pub prompt: FakePrompt,
}

impl FakeSystem {
    pub fn system(&self) -> System {
        System {
            packages: Box::new(self.packages.clone()),
            services: Box::new(self.services.clone()),
            links: Box::new(self.links.clone()),
            scripts: Box::new(self.scripts.clone()),
            prompt: Box::new(self.prompt.clone()),
        }
    }
}
