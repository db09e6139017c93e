//! Hook state machine.
//!
//! Every hook is either `NeverRun` or `Ran`, as recorded in the
//! [`HookStore`]. A hook fires when it is marked `always` or has never run.
//! Only successful runs of non-`always` hooks move a hook to `Ran`; failures
//! leave the state untouched so a one-shot hook retries on the next pass.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{DeklError, DeklResult};
use crate::state::HookStore;
use crate::system::ScriptRunner;

/// Lifecycle phase a hook is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookPhase {
    Pre,
    Post,
    PreSync,
    PostSync,
    PreUpdate,
    PostUpdate,
}

impl HookPhase {
    pub const MODULE: [HookPhase; 2] = [HookPhase::Pre, HookPhase::Post];
    pub const HOST: [HookPhase; 4] = [
        HookPhase::PreSync,
        HookPhase::PostSync,
        HookPhase::PreUpdate,
        HookPhase::PostUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
            Self::PreSync => "pre_sync",
            Self::PostSync => "post_sync",
            Self::PreUpdate => "pre_update",
            Self::PostUpdate => "post_update",
        }
    }

    pub fn is_host_phase(&self) -> bool {
        Self::HOST.contains(self)
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            "pre_sync" => Ok(Self::PreSync),
            "post_sync" => Ok(Self::PostSync),
            "pre_update" => Ok(Self::PreUpdate),
            "post_update" => Ok(Self::PostUpdate),
            other => Err(format!("unknown hook phase '{other}'")),
        }
    }
}

/// Owner of a hook: a module or the host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookScope {
    Host,
    Module(String),
}

impl fmt::Display for HookScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Module(name) => f.write_str(name),
        }
    }
}

/// Unique key of a hook: `<module>:<pre|post>` or `host:<phase>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId {
    pub scope: HookScope,
    pub phase: HookPhase,
}

impl HookId {
    pub fn host(phase: HookPhase) -> Self {
        Self {
            scope: HookScope::Host,
            phase,
        }
    }

    pub fn module(name: impl Into<String>, phase: HookPhase) -> Self {
        Self {
            scope: HookScope::Module(name.into()),
            phase,
        }
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.phase)
    }
}

impl serde::Serialize for HookId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for HookId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scope, phase) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected <scope>:<phase>, got '{s}'"))?;
        if scope.is_empty() {
            return Err(format!("missing scope in '{s}'"));
        }
        let phase: HookPhase = phase.parse()?;
        match (scope, phase.is_host_phase()) {
            ("host", true) => Ok(Self::host(phase)),
            (_, true) => Err(format!("phase '{phase}' is only valid for host hooks")),
            (module, false) => Ok(Self::module(module, phase)),
        }
    }
}

/// A resolved hook ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Hook {
    pub id: HookId,
    /// Absolute path of the script.
    pub script: PathBuf,
    pub always: bool,
    pub root: bool,
}

/// Persisted state of a single hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    NeverRun,
    Ran,
}

/// What happened to a hook in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookRun {
    Ran,
    Skipped,
}

/// Which hooks `hook reset` targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetTarget {
    One(HookId),
    Scope(HookScope),
}

impl FromStr for ResetTarget {
    type Err = String;

    /// Accepts `neovim:post`, `host:pre_sync`, `neovim` or `host`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(':') {
            return s.parse().map(Self::One);
        }
        if s.is_empty() {
            return Err("hook name must not be empty".to_string());
        }
        Ok(match s {
            "host" => Self::Scope(HookScope::Host),
            module => Self::Scope(HookScope::Module(module.to_string())),
        })
    }
}

pub fn state(store: &HookStore, id: &HookId) -> HookState {
    if store.has_run(id) {
        HookState::Ran
    } else {
        HookState::NeverRun
    }
}

/// Whether a hook fires in this pass.
pub fn should_run(store: &HookStore, hook: &Hook) -> bool {
    hook.always || state(store, &hook.id) == HookState::NeverRun
}

/// Apply the post-execution recording rule for a successful run.
pub fn record_success(store: &mut HookStore, hook: &Hook) {
    if !hook.always {
        store.mark_ran(&hook.id);
    }
}

/// Force hooks back to `NeverRun`. Returns the ids that had history.
pub fn reset(store: &mut HookStore, target: &ResetTarget) -> Vec<HookId> {
    match target {
        ResetTarget::One(id) => {
            if store.clear_hook(id) {
                vec![id.clone()]
            } else {
                Vec::new()
            }
        }
        ResetTarget::Scope(scope) => store.clear_scope(scope),
    }
}

/// Execute a hook unconditionally, then apply the recording rule.
pub fn run_now(store: &mut HookStore, runner: &dyn ScriptRunner, hook: &Hook) -> DeklResult<()> {
    tracing::debug!(
        hook = %hook.id,
        script = %hook.script.display(),
        root = hook.root,
        "Running hook"
    );

    let env = hook_env(&hook.id);
    let status = runner
        .run(&hook.script, hook.root, &env)
        .map_err(|e| DeklError::HookFailed {
            id: hook.id.clone(),
            reason: format!("{e:#}"),
        })?;

    if !status.success() {
        let reason = match status.code() {
            Some(code) => format!("{} exited with status {code}", hook.script.display()),
            None => format!("{} was terminated by a signal", hook.script.display()),
        };
        return Err(DeklError::HookFailed {
            id: hook.id.clone(),
            reason,
        });
    }

    record_success(store, hook);
    tracing::info!(hook = %hook.id, "Hook completed");
    Ok(())
}

/// Run a hook if [`should_run`] says so.
pub fn run_if_due(
    store: &mut HookStore,
    runner: &dyn ScriptRunner,
    hook: &Hook,
) -> DeklResult<HookRun> {
    if !should_run(store, hook) {
        tracing::debug!(hook = %hook.id, "Hook already ran, skipping");
        return Ok(HookRun::Skipped);
    }
    run_now(store, runner, hook)?;
    Ok(HookRun::Ran)
}

fn hook_env(id: &HookId) -> Vec<(String, String)> {
    let mut env = vec![
        ("DEKL_HOOK".to_string(), id.to_string()),
        ("DEKL_PHASE".to_string(), id.phase.to_string()),
    ];
    if let HookScope::Module(module) = &id.scope {
        env.push(("DEKL_MODULE".to_string(), module.clone()));
    }
    env
}
