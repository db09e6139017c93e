//! `dekl status`: show how far the machine is from its declaration.

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;

use super::{CommandContext, print_warnings, prune_override, system_for};
use crate::output::Output;
use crate::plan::ActionPlan;
use crate::resolve::{self, DeclaredState};
use crate::state::HookStore;
use crate::sync::{self, SyncContext, SyncOptions};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum StatusFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = StatusFormat::Table)]
    pub format: StatusFormat,

    /// Show removals as if auto_prune were on
    #[arg(long, overrides_with = "no_prune")]
    pub prune: bool,

    /// Show removals as if auto_prune were off
    #[arg(long)]
    pub no_prune: bool,
}

#[derive(Debug, Serialize)]
struct Counts {
    packages: usize,
    services: usize,
    dotfiles: usize,
    hooks: usize,
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    host: &'a str,
    prune: bool,
    declared: Counts,
    installed: usize,
    orphans: Vec<String>,
    missing_modules: Vec<String>,
    warnings: Vec<String>,
    plan: &'a ActionPlan,
    in_sync: bool,
}

fn counts(declared: &DeclaredState, plan: &ActionPlan) -> Counts {
    Counts {
        packages: declared.packages.len(),
        services: declared.services.len(),
        dotfiles: plan.dotfiles.total(),
        hooks: declared.hooks.len(),
    }
}

pub fn run(args: StatusArgs, ctx: &CommandContext) -> Result<()> {
    let layout = &ctx.layout;
    let host = ctx.host()?;

    // Missing modules are reported rather than fatal here.
    let missing = resolve::missing_modules(layout, &host.manifest);
    let mut manifest = host.manifest.clone();
    manifest.modules.retain(|m| !missing.contains(m));
    let modules = resolve::load_modules(layout, &manifest)?;
    let declared = resolve::resolve(layout, &manifest, &modules)?;

    let system = system_for(&host.manifest);
    let store = HookStore::load(&layout.state_file())?;
    let opts = SyncOptions {
        dry_run: true,
        prune: prune_override(args.prune, args.no_prune),
        ..Default::default()
    };
    let sync_ctx = SyncContext {
        layout,
        host: &manifest,
        declared: &declared,
        system: &system,
    };

    let (plan, dotfile_warnings) = sync::plan(&sync_ctx, &store, &opts)?;
    let installed = declared.packages.len() - plan.packages.to_install.len()
        + plan.packages.undeclared.len();
    let orphans: Vec<String> = system.packages.orphan_packages()?.into_iter().collect();

    let mut warnings = declared.warnings.clone();
    warnings.extend(dotfile_warnings);

    let prune = manifest.prune_enabled(opts.prune);
    let in_sync = plan.is_empty()
        && plan.dotfiles.blocked.is_empty()
        && plan.packages.undeclared.is_empty()
        && missing.is_empty();

    let report = StatusReport {
        host: &host.name,
        prune,
        declared: counts(&declared, &plan),
        installed,
        orphans,
        missing_modules: missing,
        warnings,
        plan: &plan,
        in_sync,
    };

    match args.format {
        StatusFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        StatusFormat::Table => print_table(&report),
    }
    Ok(())
}

fn print_table(report: &StatusReport<'_>) {
    Output::header("dekl status");
    Output::kv("Host", report.host);
    Output::kv(
        "Declared",
        format!(
            "{} packages, {} services, {} dotfiles, {} hooks",
            report.declared.packages,
            report.declared.services,
            report.declared.dotfiles,
            report.declared.hooks
        ),
    );
    Output::kv(
        "Installed",
        format!(
            "{} explicit, {} orphans",
            report.installed,
            report.orphans.len()
        ),
    );
    Output::kv("Prune", if report.prune { "enabled" } else { "disabled" });

    if !report.missing_modules.is_empty() {
        Output::blank();
        Output::warning("Missing modules:");
        for module in &report.missing_modules {
            Output::list_item(module);
        }
    }
    if !report.warnings.is_empty() {
        Output::blank();
        print_warnings(&report.warnings);
    }

    for section in report.plan.describe() {
        Output::blank();
        print!("{section}");
    }

    let plan = report.plan;
    if !report.prune && !plan.packages.undeclared.is_empty() {
        Output::blank();
        Output::subheader("Undeclared (kept, prune disabled)");
        for package in &plan.packages.undeclared {
            Output::list_item(package);
        }
    }
    if !report.orphans.is_empty() {
        Output::blank();
        Output::subheader("Orphans");
        for package in &report.orphans {
            Output::list_item(package);
        }
        Output::hint("Remove with: pacman -Rns $(pacman -Qdtq)");
    }

    Output::blank();
    if report.in_sync {
        Output::success("System is in sync");
    } else {
        if !plan.hooks.is_empty() {
            Output::info(format!("{} hook(s) will run on the next sync", plan.hooks.len()));
        }
        Output::hint("Run: dekl sync");
    }
}
