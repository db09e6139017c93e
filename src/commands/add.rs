//! `dekl add`: declare packages in a module and install them.

use anyhow::Result;
use clap::Args;

use super::{CommandContext, check_report, system_for};
use crate::manifest::ModuleManifest;
use crate::output::Output;
use crate::plan::{ExecutionReport, Verb};

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Package(s) to add
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Module to add them to
    #[arg(short, long, default_value = "local")]
    pub module: String,
}

pub fn run(args: AddArgs, ctx: &CommandContext) -> Result<()> {
    let host = ctx.host()?;
    let mut module = ModuleManifest::load_or_default(&ctx.layout, &args.module)?;

    let added = add_packages(&mut module, &args.packages);
    for package in &args.packages {
        if added.contains(package) {
            Output::added(format!("{package} → {}", args.module));
        } else {
            Output::warning(format!("{package} already in {}", args.module));
        }
    }
    if added.is_empty() {
        return Ok(());
    }

    if !host.manifest.modules.contains(&args.module) {
        Output::warning(format!("Module {} is not active on this host", args.module));
        Output::hint(format!("Run: dekl module on {}", args.module));
    }

    if ctx.dry_run {
        Output::dry_run(format!("Would install {} package(s)", added.len()));
        return Ok(());
    }

    module.save(&ctx.layout, &args.module)?;

    let system = system_for(&host.manifest);
    let mut report = ExecutionReport::new();
    for outcome in system.packages.install(&added) {
        match outcome.error {
            None => report.record_success(Verb::Install, outcome.item),
            Some(err) => report.record_failure(Verb::Install, outcome.item, err),
        }
    }
    check_report(&report)
}

/// Declare packages, returning the ones that were new.
fn add_packages(module: &mut ModuleManifest, packages: &[String]) -> Vec<String> {
    packages
        .iter()
        .filter(|p| module.add_package(p))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_packages_skips_declared() {
        let mut module = ModuleManifest {
            packages: vec!["git".to_string()],
            ..Default::default()
        };
        let added = add_packages(
            &mut module,
            &["git".to_string(), "ripgrep".to_string(), "ripgrep".to_string()],
        );
        assert_eq!(added, vec!["ripgrep".to_string()]);
        assert_eq!(module.packages, vec!["git".to_string(), "ripgrep".to_string()]);
    }
}
