//! Collaborators that observe and mutate the machine.
//!
//! The engine only talks to the system through these traits. Production
//! adapters shell out through [`CommandRunner`](crate::command_runner::CommandRunner);
//! tests use the in-memory fakes in `fake`.

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;

use crate::command_runner::{CommandOptions, CommandRunner, RealCommandRunner};
use crate::manifest::AurHelper;
use crate::resolve::ServiceScope;

#[cfg(test)]
pub mod fake;
pub mod links;
pub mod pacman;
pub mod prompt;
pub mod scripts;
pub mod systemd;

pub use links::FsLinks;
pub use pacman::Pacman;
pub use prompt::CliPrompter;
pub use scripts::BashScripts;
pub use systemd::Systemctl;

/// Outcome of one item in a batch (a package, a unit, a link).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub item: String,
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn ok(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            error: None,
        }
    }

    pub fn failed(item: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Package queries and transactions.
pub trait PackageManager {
    /// Explicitly installed packages.
    fn explicit_packages(&self) -> Result<BTreeSet<String>>;

    /// Dependencies no installed package requires any more.
    fn orphan_packages(&self) -> Result<BTreeSet<String>>;

    /// Install packages, reporting success or failure per package.
    fn install(&self, packages: &[String]) -> Vec<ItemOutcome>;

    /// Remove packages (and their unneeded dependencies), per package.
    fn remove(&self, packages: &[String]) -> Vec<ItemOutcome>;

    /// Full system upgrade.
    fn upgrade(&self) -> Result<()>;
}

/// systemd unit queries and toggles.
pub trait ServiceController {
    /// Units currently enabled in a scope.
    fn enabled_units(&self, scope: ServiceScope) -> Result<BTreeSet<String>>;

    /// Enable and start a unit.
    fn enable(&self, unit: &str, scope: ServiceScope) -> Result<()>;

    /// Disable and stop a unit.
    fn disable(&self, unit: &str, scope: ServiceScope) -> Result<()>;
}

/// What currently sits at a symlink target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Absent,
    Symlink(PathBuf),
    File,
    Directory,
}

/// Symlink inspection and mutation.
pub trait SymlinkManager {
    fn inspect(&self, target: &Path) -> Result<LinkState>;

    /// Create a symlink, creating parent directories as needed.
    fn create(&self, target: &Path, source: &Path) -> Result<()>;

    /// Swap an existing symlink for one pointing at `source`.
    fn replace(&self, target: &Path, source: &Path) -> Result<()>;

    /// Remove a symlink. Refuses to remove anything else.
    fn remove(&self, target: &Path) -> Result<()>;
}

/// Hook script execution.
pub trait ScriptRunner {
    /// Run a script, optionally elevated, and return its exit status.
    fn run(&self, script: &Path, root: bool, env: &[(String, String)]) -> Result<ExitStatus>;
}

/// Interactive confirmation.
pub trait Prompter {
    /// Ask a yes/no question. `Ok(false)` means the user declined.
    fn confirm(&self, message: &str) -> Result<bool>;
}

/// Every collaborator the engine needs, bundled for threading through a run.
pub struct System {
    pub packages: Box<dyn PackageManager>,
    pub services: Box<dyn ServiceController>,
    pub links: Box<dyn SymlinkManager>,
    pub scripts: Box<dyn ScriptRunner>,
    pub prompt: Box<dyn Prompter>,
}

impl System {
    /// Production adapters for the given package frontend.
    pub fn real(helper: AurHelper) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(RealCommandRunner);
        Self {
            packages: Box::new(Pacman::new(helper, runner.clone())),
            services: Box::new(Systemctl::new(runner.clone())),
            links: Box::new(FsLinks),
            scripts: Box::new(BashScripts::new(runner)),
            prompt: Box::new(CliPrompter),
        }
    }
}

/// True when running with an effective UID of 0.
pub fn is_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

/// Prefix a command with `sudo` unless already root.
pub(crate) fn elevated<'a>(program: &'a str, args: &[&'a str]) -> (&'a str, Vec<&'a str>) {
    if is_root() {
        (program, args.to_vec())
    } else {
        let mut full = vec![program];
        full.extend_from_slice(args);
        ("sudo", full)
    }
}

/// Whether a program is on `PATH`.
pub fn command_exists(runner: &dyn CommandRunner, program: &str) -> bool {
    runner
        .run_output("which", &[program], &CommandOptions::default())
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Split command output into one trimmed entry per non-empty line.
pub(crate) fn parse_lines(stdout: &[u8]) -> BTreeSet<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}
