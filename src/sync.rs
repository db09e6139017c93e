//! Sync orchestrator.
//!
//! `plan` observes the machine and builds an [`ActionPlan`] with no side
//! effects. `execute` applies it in phase order:
//!
//! host `pre_sync` → module `pre` → installs → removals → enables →
//! disables → dotfiles → module `post` → host `post_sync`
//!
//! Package and service failures are per item and do not stop the run. A
//! failed hook or a declined confirmation ends it; whatever already ran
//! stays applied.

use anyhow::Result;
use std::path::Path;

use crate::diff::{self, ActualState};
use crate::dotfiles::{self, DotfilePlan};
use crate::error::DeklError;
use crate::hooks::{self, Hook, HookId, HookPhase, HookRun};
use crate::manifest::HostManifest;
use crate::output::Output;
use crate::paths::Layout;
use crate::plan::{ActionPlan, ExecutionReport, Verb};
use crate::resolve::{DeclaredState, ServiceKey, ServiceScope};
use crate::state::HookStore;
use crate::system::System;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    pub dry_run: bool,
    /// Overrides the host's `auto_prune`.
    pub prune: Option<bool>,
    /// Skip confirmation of destructive batches.
    pub yes: bool,
    pub no_hooks: bool,
    pub no_dotfiles: bool,
    pub no_services: bool,
}

/// Everything the orchestrator reads.
pub struct SyncContext<'a> {
    pub layout: &'a Layout,
    pub host: &'a HostManifest,
    pub declared: &'a DeclaredState,
    pub system: &'a System,
}

/// Why a run stopped before the last phase.
#[derive(Debug)]
pub enum Abort {
    /// The user declined a destructive batch.
    Declined(String),
    Hook(DeklError),
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub report: ExecutionReport,
    pub hooks_run: Vec<HookId>,
    pub aborted: Option<Abort>,
}

impl SyncReport {
    /// Whether the run should exit nonzero.
    pub fn failed(&self) -> bool {
        self.report.has_failures() || matches!(self.aborted, Some(Abort::Hook(_)))
    }
}

/// Load the state store, run `f`, and write the store back exactly once,
/// whatever `f` returned. Dry runs never write.
///
/// When both `f` and the write fail, the write error is logged and `f`'s
/// error is returned.
pub fn with_store<T>(
    path: &Path,
    dry_run: bool,
    f: impl FnOnce(&mut HookStore) -> Result<T>,
) -> Result<T> {
    let mut store = HookStore::load(path)?;
    let result = f(&mut store);
    if dry_run {
        return result;
    }
    match (store.save(path), result) {
        (Ok(()), result) => result,
        (Err(save), Ok(_)) => Err(save),
        (Err(save), Err(e)) => {
            tracing::error!(
                path = %path.display(),
                error = %format!("{save:#}"),
                "Failed to save state"
            );
            Output::error(format!("Failed to save {}: {save:#}", path.display()));
            Err(e)
        }
    }
}

/// Bring the store's link records in line with a dotfile plan without
/// touching the filesystem: links already in place are recorded and records
/// that no longer hold are dropped.
pub fn reconcile_links(store: &mut HookStore, dots: &DotfilePlan) {
    for intent in &dots.unchanged {
        store.record_link(&intent.target, &intent.source);
    }
    for target in &dots.forget {
        store.forget_link(target);
    }
}

/// Query explicit packages and enabled units.
pub fn observe(system: &System, opts: &SyncOptions) -> Result<ActualState> {
    let spinner = Output::spinner("Reading system state...");
    let installed = match system.packages.explicit_packages() {
        Ok(installed) => installed,
        Err(e) => {
            spinner.finish_error("Failed to read installed packages");
            return Err(e);
        }
    };

    let mut actual = ActualState {
        installed,
        ..Default::default()
    };
    if !opts.no_services {
        for scope in [ServiceScope::System, ServiceScope::User] {
            let units = match system.services.enabled_units(scope) {
                Ok(units) => units,
                Err(e) => {
                    spinner.finish_error("Failed to read enabled services");
                    return Err(e);
                }
            };
            actual
                .enabled
                .extend(units.into_iter().map(|name| ServiceKey { name, scope }));
        }
    }
    spinner.finish_clear();
    Ok(actual)
}

/// Hooks for `phases`, in firing order, whether due or not.
///
/// Module phases follow host module order; host phases have one hook each.
pub fn phase_hooks<'a>(declared: &'a DeclaredState, phases: &[HookPhase]) -> Vec<&'a Hook> {
    let mut hooks = Vec::new();
    for &phase in phases {
        if phase.is_host_phase() {
            hooks.extend(declared.hook(&HookId::host(phase)));
        } else {
            hooks.extend(declared.module_hooks(phase));
        }
    }
    hooks
}

const SYNC_PRE: [HookPhase; 2] = [HookPhase::PreSync, HookPhase::Pre];
const SYNC_POST: [HookPhase; 2] = [HookPhase::Post, HookPhase::PostSync];

/// Build the full plan for a sync. No collaborator is asked to mutate
/// anything, and a dotfile conflict is reported here.
pub fn plan(
    ctx: &SyncContext<'_>,
    store: &HookStore,
    opts: &SyncOptions,
) -> Result<(ActionPlan, Vec<String>)> {
    let actual = observe(ctx.system, opts)?;
    let prune = ctx.host.prune_enabled(opts.prune);
    let (packages, mut services) = diff::diff(ctx.declared, &actual, prune);
    if opts.no_services {
        services = Default::default();
    }

    let mut warnings = Vec::new();
    let dotfiles = if opts.no_dotfiles {
        Default::default()
    } else {
        let (plan, found) = dotfiles::plan(
            ctx.layout,
            &ctx.declared.dotfiles,
            ctx.system.links.as_ref(),
            store.links(),
        )?;
        warnings.extend(found);
        plan
    };

    let hooks = if opts.no_hooks {
        Vec::new()
    } else {
        let mut phases = SYNC_PRE.to_vec();
        phases.extend(SYNC_POST);
        phase_hooks(ctx.declared, &phases)
            .into_iter()
            .filter(|h| hooks::should_run(store, h))
            .map(|h| h.id.clone())
            .collect()
    };

    tracing::debug!(
        install = packages.to_install.len(),
        remove = packages.to_remove.len(),
        enable = services.to_enable.len(),
        disable = services.to_disable.len(),
        hooks = hooks.len(),
        "Planned sync"
    );

    Ok((
        ActionPlan {
            packages,
            services,
            dotfiles,
            hooks,
        },
        warnings,
    ))
}

/// Run each due hook of `phases`. Stops at the first failure.
fn run_hooks(
    ctx: &SyncContext<'_>,
    store: &mut HookStore,
    phases: &[HookPhase],
    out: &mut SyncReport,
) -> bool {
    for hook in phase_hooks(ctx.declared, phases) {
        if !hooks::should_run(store, hook) {
            continue;
        }
        Output::info(format!("Running hook {}", hook.id));
        match hooks::run_if_due(store, ctx.system.scripts.as_ref(), hook) {
            Ok(HookRun::Ran) => {
                out.report.record_success(Verb::Run, hook.id.to_string());
                out.hooks_run.push(hook.id.clone());
            }
            Ok(HookRun::Skipped) => {}
            Err(e) => {
                Output::error(e.to_string());
                out.aborted = Some(Abort::Hook(e));
                return false;
            }
        }
    }
    true
}

fn confirm(ctx: &SyncContext<'_>, opts: &SyncOptions, question: &str) -> Result<bool> {
    if opts.yes {
        return Ok(true);
    }
    ctx.system.prompt.confirm(question)
}

/// Apply a plan. Returns early (with `aborted` set) on a failed hook or a
/// declined confirmation.
pub fn execute(
    ctx: &SyncContext<'_>,
    store: &mut HookStore,
    plan: &ActionPlan,
    opts: &SyncOptions,
) -> Result<SyncReport> {
    let mut out = SyncReport::default();
    if opts.dry_run {
        return Ok(out);
    }

    if !opts.no_hooks && !run_hooks(ctx, store, &SYNC_PRE, &mut out) {
        return Ok(out);
    }

    let packages = &plan.packages;
    if !packages.to_install.is_empty() {
        Output::subheader(format!("Installing {} package(s)", packages.to_install.len()));
        for outcome in ctx.system.packages.install(&packages.to_install) {
            match outcome.error {
                None => out.report.record_success(Verb::Install, outcome.item),
                Some(err) => out.report.record_failure(Verb::Install, outcome.item, err),
            }
        }
    }

    if !packages.to_remove.is_empty() {
        for package in &packages.to_remove {
            Output::removed(package);
        }
        let question = format!("Remove {} package(s)?", packages.to_remove.len());
        if !confirm(ctx, opts, &question)? {
            out.aborted = Some(Abort::Declined("package removal".to_string()));
            return Ok(out);
        }
        for outcome in ctx.system.packages.remove(&packages.to_remove) {
            match outcome.error {
                None => out.report.record_success(Verb::Remove, outcome.item),
                Some(err) => out.report.record_failure(Verb::Remove, outcome.item, err),
            }
        }
    }

    for key in &plan.services.to_enable {
        match ctx.system.services.enable(&key.name, key.scope) {
            Ok(()) => {
                tracing::info!(service = %key, "Enabled");
                out.report.record_success(Verb::Enable, key.to_string());
            }
            Err(e) => out.report.record_failure(Verb::Enable, key.to_string(), format!("{e:#}")),
        }
    }
    for key in &plan.services.to_disable {
        match ctx.system.services.disable(&key.name, key.scope) {
            Ok(()) => {
                tracing::info!(service = %key, "Disabled");
                out.report.record_success(Verb::Disable, key.to_string());
            }
            Err(e) => out.report.record_failure(Verb::Disable, key.to_string(), format!("{e:#}")),
        }
    }

    if !apply_dotfiles(ctx, store, plan, opts, &mut out)? {
        return Ok(out);
    }

    if !opts.no_hooks {
        run_hooks(ctx, store, &SYNC_POST, &mut out);
    }
    Ok(out)
}

fn apply_dotfiles(
    ctx: &SyncContext<'_>,
    store: &mut HookStore,
    plan: &ActionPlan,
    opts: &SyncOptions,
    out: &mut SyncReport,
) -> Result<bool> {
    let dots = &plan.dotfiles;
    let links = ctx.system.links.as_ref();

    for blocked in &dots.blocked {
        let target = blocked.intent.target.display().to_string();
        Output::warning(format!("{target} exists and is not a symlink; move it aside"));
        out.report.record_failure(
            Verb::Link,
            target,
            "a real file or directory is in the way",
        );
    }

    reconcile_links(store, dots);

    for intent in &dots.create {
        let label = intent.label();
        match links.create(&intent.target, &intent.source) {
            Ok(()) => {
                store.record_link(&intent.target, &intent.source);
                Output::added(&label);
                out.report.record_success(Verb::Link, label);
            }
            Err(e) => out.report.record_failure(Verb::Link, label, format!("{e:#}")),
        }
    }

    let destructive = dots.replace.len() + dots.remove.len();
    if destructive == 0 {
        return Ok(true);
    }
    for r in &dots.replace {
        Output::changed(format!("{} (was {})", r.intent.label(), r.current.display()));
    }
    for s in &dots.remove {
        Output::removed(s.target.display().to_string());
    }
    let question = format!("Replace or remove {destructive} symlink(s)?");
    if !confirm(ctx, opts, &question)? {
        out.aborted = Some(Abort::Declined("symlink changes".to_string()));
        return Ok(false);
    }

    for r in &dots.replace {
        let label = r.intent.label();
        match links.replace(&r.intent.target, &r.intent.source) {
            Ok(()) => {
                store.record_link(&r.intent.target, &r.intent.source);
                out.report.record_success(Verb::Relink, label);
            }
            Err(e) => out.report.record_failure(Verb::Relink, label, format!("{e:#}")),
        }
    }
    for stale in &dots.remove {
        let target = stale.target.display().to_string();
        match links.remove(&stale.target) {
            Ok(()) => {
                store.forget_link(&stale.target);
                out.report.record_success(Verb::Unlink, target);
            }
            Err(e) => out.report.record_failure(Verb::Unlink, target, format!("{e:#}")),
        }
    }
    Ok(true)
}

/// Hooks that would fire around an upgrade.
pub fn update_hooks<'a>(declared: &'a DeclaredState, store: &HookStore) -> Vec<&'a Hook> {
    phase_hooks(declared, &[HookPhase::PreUpdate, HookPhase::PostUpdate])
        .into_iter()
        .filter(|h| hooks::should_run(store, h))
        .collect()
}

/// `pre_update` → full upgrade → `post_update`.
pub fn update(
    ctx: &SyncContext<'_>,
    store: &mut HookStore,
    opts: &SyncOptions,
) -> Result<SyncReport> {
    let mut out = SyncReport::default();
    if opts.dry_run {
        return Ok(out);
    }

    if !opts.no_hooks && !run_hooks(ctx, store, &[HookPhase::PreUpdate], &mut out) {
        return Ok(out);
    }

    match ctx.system.packages.upgrade() {
        Ok(()) => out.report.record_success(Verb::Upgrade, "system"),
        Err(e) => {
            out.report
                .record_failure(Verb::Upgrade, "system", format!("{e:#}"));
            return Ok(out);
        }
    }

    if !opts.no_hooks {
        run_hooks(ctx, store, &[HookPhase::PostUpdate], &mut out);
    }
    Ok(out)
}
