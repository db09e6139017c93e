//! Command implementations.
//!
//! Each command has an `Args` struct and a `run` entry point. Helpers shared
//! by the commands that talk to the machine live here.

pub mod add;
pub mod completions;
pub mod disable;
pub mod drop;
pub mod enable;
pub mod hook;
pub mod init;
pub mod merge;
pub mod module;
pub mod schema;
pub mod status;
pub mod sync;
pub mod update;

use anyhow::{Result, bail};

use crate::aur;
use crate::cli::Cli;
use crate::command_runner::RealCommandRunner;
use crate::manifest::HostManifest;
use crate::output::Output;
use crate::paths::Layout;
use crate::plan::ExecutionReport;
use crate::resolve::HostContext;
use crate::sync::{Abort, SyncReport};
use crate::system::System;

/// Options every command receives.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub layout: Layout,
    pub dry_run: bool,
}

impl CommandContext {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            layout: Layout::discover(),
            dry_run: cli.dry_run,
        }
    }

    /// The active host, or a config error.
    pub fn host(&self) -> Result<HostContext> {
        Ok(HostContext::load(&self.layout)?)
    }
}

/// Production collaborators for a host, using whichever package frontend is
/// actually installed.
pub(crate) fn system_for(host: &HostManifest) -> System {
    let helper = aur::effective_helper(&RealCommandRunner, host.aur_helper);
    tracing::debug!(
        configured = %host.aur_helper,
        effective = %helper,
        "Selected package frontend"
    );
    System::real(helper)
}

/// Fold `--prune` / `--no-prune` into an override.
pub(crate) fn prune_override(prune: bool, no_prune: bool) -> Option<bool> {
    match (prune, no_prune) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

pub(crate) fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        Output::warning(warning);
    }
}

/// Print an execution report and fail if anything in it failed.
pub(crate) fn check_report(report: &ExecutionReport) -> Result<()> {
    if report.results.is_empty() {
        return Ok(());
    }
    Output::blank();
    print!("{report}");
    if report.has_failures() {
        bail!("{} operation(s) failed", report.failure_count());
    }
    Ok(())
}

/// Report the end of a sync or update and pick the exit status.
pub(crate) fn finish_run(result: SyncReport, done: &str) -> Result<()> {
    let SyncReport {
        report, aborted, ..
    } = result;

    match aborted {
        Some(Abort::Hook(err)) => {
            if !report.results.is_empty() {
                Output::blank();
                print!("{report}");
            }
            Output::hint("Fix the hook and run again; completed steps are kept");
            Err(err.into())
        }
        Some(Abort::Declined(what)) => {
            Output::warning(format!("Aborted at {what}; earlier changes were kept"));
            check_report(&report)
        }
        None => {
            check_report(&report)?;
            Output::success(done);
            Ok(())
        }
    }
}
