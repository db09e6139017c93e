//! `dekl drop`: remove packages from every active module and uninstall them.

use anyhow::Result;
use clap::Args;
use std::collections::BTreeMap;

use super::{CommandContext, check_report, system_for};
use crate::manifest::ModuleManifest;
use crate::output::Output;
use crate::plan::{ExecutionReport, Verb};
use crate::resolve;

#[derive(Debug, Args)]
pub struct DropArgs {
    /// Package(s) to drop
    #[arg(required = true)]
    pub packages: Vec<String>,
}

pub fn run(args: DropArgs, ctx: &CommandContext) -> Result<()> {
    let host = ctx.host()?;
    let missing = resolve::missing_modules(&ctx.layout, &host.manifest);
    let mut manifest = host.manifest.clone();
    manifest.modules.retain(|m| !missing.contains(m));
    let mut modules = resolve::load_modules(&ctx.layout, &manifest)?;

    let provenance = drop_packages(&mut modules, &args.packages);
    let mut to_remove = Vec::new();
    for package in &args.packages {
        match provenance.get(package) {
            Some(owners) => {
                for owner in owners {
                    Output::removed(format!("{package} ← {owner}"));
                }
                to_remove.push(package.clone());
            }
            None => Output::warning(format!("{package} is not declared in any active module")),
        }
    }
    if to_remove.is_empty() {
        return Ok(());
    }

    if ctx.dry_run {
        Output::dry_run(format!("Would uninstall {} package(s)", to_remove.len()));
        return Ok(());
    }

    let mut touched: Vec<&String> = provenance.values().flatten().collect();
    touched.sort();
    touched.dedup();
    for name in touched {
        if let Some(module) = modules.get(name) {
            module.save(&ctx.layout, name)?;
        }
    }

    let system = system_for(&host.manifest);
    let mut report = ExecutionReport::new();
    for outcome in system.packages.remove(&to_remove) {
        match outcome.error {
            None => report.record_success(Verb::Remove, outcome.item),
            Some(err) => report.record_failure(Verb::Remove, outcome.item, err),
        }
    }
    check_report(&report)
}

/// Remove packages from every module. Returns package → modules it was
/// removed from; undeclared packages are absent.
fn drop_packages(
    modules: &mut BTreeMap<String, ModuleManifest>,
    packages: &[String],
) -> BTreeMap<String, Vec<String>> {
    let mut provenance: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for package in packages {
        for (name, module) in modules.iter_mut() {
            if module.remove_package(package) {
                provenance
                    .entry(package.clone())
                    .or_default()
                    .push(name.clone());
            }
        }
    }
    provenance
}
