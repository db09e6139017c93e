//! `dekl disable`: mark services disabled (or drop them) and disable them.

use anyhow::Result;
use clap::Args;

use super::{CommandContext, check_report, system_for};
use crate::manifest::{ModuleManifest, ServiceEntry, normalize_service_name};
use crate::output::Output;
use crate::plan::{ExecutionReport, Verb};
use crate::resolve::{ServiceKey, ServiceScope};

#[derive(Debug, Args)]
pub struct DisableArgs {
    /// Service(s) to disable
    #[arg(required = true)]
    pub services: Vec<String>,

    /// Only look in this module (default: every active module)
    #[arg(short, long)]
    pub module: Option<String>,

    /// Remove the declaration instead of setting enabled: false
    #[arg(short, long)]
    pub remove: bool,

    /// User service (systemctl --user)
    #[arg(long)]
    pub user: bool,
}

pub fn run(args: DisableArgs, ctx: &CommandContext) -> Result<()> {
    let host = ctx.host()?;
    let search: Vec<String> = match &args.module {
        Some(module) => vec![module.clone()],
        None => host.manifest.modules.clone(),
    };

    let mut to_disable = Vec::new();
    for service in &args.services {
        let unit = normalize_service_name(service);
        let mut found = false;

        for name in &search {
            if !ctx.layout.module_file(name).exists() {
                continue;
            }
            let mut module = ModuleManifest::load(&ctx.layout, name)?;
            let Some(user) = undeclare(&mut module, &unit, args.user, args.remove) else {
                continue;
            };

            let key = ServiceKey {
                name: unit.clone(),
                scope: ServiceScope::from_user_flag(user),
            };
            if args.remove {
                Output::removed(format!("{key} ← {name}"));
            } else {
                Output::changed(format!("{key} → enabled: false in {name}"));
            }
            if !ctx.dry_run {
                module.save(&ctx.layout, name)?;
            }
            to_disable.push(key);
            found = true;
            break;
        }

        if !found {
            Output::warning(format!("{unit} is not declared in any active module"));
        }
    }
    if to_disable.is_empty() {
        return Ok(());
    }

    if ctx.dry_run {
        Output::dry_run(format!("Would disable {} service(s)", to_disable.len()));
        return Ok(());
    }

    let system = system_for(&host.manifest);
    let mut report = ExecutionReport::new();
    for key in to_disable {
        match system.services.disable(&key.name, key.scope) {
            Ok(()) => report.record_success(Verb::Disable, key.to_string()),
            Err(e) => report.record_failure(Verb::Disable, key.to_string(), format!("{e:#}")),
        }
    }
    check_report(&report)
}

/// Remove a service declaration or set it to `enabled: false`.
///
/// Returns whether the unit is a user unit, or `None` if the module does not
/// declare it.
fn undeclare(module: &mut ModuleManifest, unit: &str, user: bool, remove: bool) -> Option<bool> {
    let i = module.find_service(unit)?;
    let user = user || module.services[i].is_user();
    if remove {
        module.services.remove(i);
    } else {
        module.services[i] = ServiceEntry::new(unit, user, false);
    }
    Some(user)
}
