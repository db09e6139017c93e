//! `dekl enable`: declare services in a module and enable them.

use anyhow::Result;
use clap::Args;

use super::{CommandContext, check_report, system_for};
use crate::manifest::{ModuleManifest, ServiceEntry, normalize_service_name};
use crate::output::Output;
use crate::plan::{ExecutionReport, Verb};
use crate::resolve::{ServiceKey, ServiceScope};

#[derive(Debug, Args)]
pub struct EnableArgs {
    /// Service(s) to enable; `.service` is implied without a suffix
    #[arg(required = true)]
    pub services: Vec<String>,

    /// Module to declare them in
    #[arg(short, long, default_value = "local")]
    pub module: String,

    /// User service (systemctl --user)
    #[arg(long)]
    pub user: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Added,
    Reenabled,
    Unchanged,
}

pub fn run(args: EnableArgs, ctx: &CommandContext) -> Result<()> {
    let host = ctx.host()?;
    let mut module = ModuleManifest::load_or_default(&ctx.layout, &args.module)?;
    let scope = ServiceScope::from_user_flag(args.user);

    let mut to_enable = Vec::new();
    for service in &args.services {
        let key = ServiceKey {
            name: normalize_service_name(service),
            scope,
        };
        match declare_enabled(&mut module, service, args.user) {
            Change::Added => Output::added(format!("{key} → {}", args.module)),
            Change::Reenabled => Output::changed(format!("{key} re-enabled in {}", args.module)),
            Change::Unchanged => {
                Output::warning(format!("{key} already enabled in {}", args.module));
                continue;
            }
        }
        to_enable.push(key);
    }
    if to_enable.is_empty() {
        return Ok(());
    }

    if ctx.dry_run {
        Output::dry_run(format!("Would enable {} service(s)", to_enable.len()));
        return Ok(());
    }

    module.save(&ctx.layout, &args.module)?;

    let system = system_for(&host.manifest);
    let mut report = ExecutionReport::new();
    for key in to_enable {
        match system.services.enable(&key.name, key.scope) {
            Ok(()) => report.record_success(Verb::Enable, key.to_string()),
            Err(e) => report.record_failure(Verb::Enable, key.to_string(), format!("{e:#}")),
        }
    }
    check_report(&report)
}

/// Declare a service enabled, flipping an existing `enabled: false` entry.
fn declare_enabled(module: &mut ModuleManifest, service: &str, user: bool) -> Change {
    match module.find_service(service) {
        Some(i) if module.services[i].is_enabled() => Change::Unchanged,
        Some(i) => {
            let name = module.services[i].raw_name().to_string();
            module.services[i] = ServiceEntry::new(&name, user, true);
            Change::Reenabled
        }
        None => {
            module.services.push(ServiceEntry::new(service, user, true));
            Change::Added
        }
    }
}
