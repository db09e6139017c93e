//! `dekl merge`: capture the machine's current state into `modules/system`.

use anyhow::Result;
use clap::Args;
use std::collections::BTreeSet;

use super::CommandContext;
use crate::manifest::{AurHelper, ModuleManifest, ServiceEntry};
use crate::output::Output;
use crate::resolve::{self, ServiceKey, ServiceScope};
use crate::system::System;

const SYSTEM_MODULE: &str = "system";

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Capture enabled services instead of packages
    #[arg(long, short)]
    pub services: bool,
}

pub fn run(args: MergeArgs, ctx: &CommandContext) -> Result<()> {
    // Queries only; the frontend does not matter.
    let system = System::real(AurHelper::Pacman);
    if args.services {
        merge_services(ctx, &system)
    } else {
        merge_packages(ctx, &system)
    }
}

fn merge_packages(ctx: &CommandContext, system: &System) -> Result<()> {
    let explicit = system.packages.explicit_packages()?;
    let mut module = ModuleManifest::load_or_default(&ctx.layout, SYSTEM_MODULE)?;
    capture_packages(&mut module, &explicit);

    if ctx.dry_run {
        Output::dry_run(format!(
            "Would capture {} package(s) into the {SYSTEM_MODULE} module",
            explicit.len()
        ));
        return Ok(());
    }

    module.save(&ctx.layout, SYSTEM_MODULE)?;
    Output::success(format!(
        "Captured {} package(s) into the {SYSTEM_MODULE} module",
        explicit.len()
    ));
    hint_activation(ctx);
    Ok(())
}

fn merge_services(ctx: &CommandContext, system: &System) -> Result<()> {
    let host = ctx.host()?;
    let modules = resolve::load_modules(&ctx.layout, &host.manifest)?;
    let declared = resolve::resolve(&ctx.layout, &host.manifest, &modules)?;

    let mut enabled = BTreeSet::new();
    for scope in [ServiceScope::System, ServiceScope::User] {
        let units = system.services.enabled_units(scope)?;
        Output::info(format!("Found {} enabled {scope} unit(s)", units.len()));
        enabled.extend(units.into_iter().map(|name| ServiceKey { name, scope }));
    }

    let unmanaged: Vec<ServiceKey> = enabled
        .into_iter()
        .filter(|key| !declared.services.contains_key(key))
        .collect();
    if unmanaged.is_empty() {
        Output::success("All enabled services are already declared");
        return Ok(());
    }

    for key in &unmanaged {
        Output::added(key.to_string());
    }
    if ctx.dry_run {
        Output::dry_run(format!(
            "Would add {} service(s) to the {SYSTEM_MODULE} module",
            unmanaged.len()
        ));
        return Ok(());
    }

    let mut module = ModuleManifest::load_or_default(&ctx.layout, SYSTEM_MODULE)?;
    capture_services(&mut module, &unmanaged);
    module.save(&ctx.layout, SYSTEM_MODULE)?;
    Output::success(format!(
        "Captured {} service(s) into the {SYSTEM_MODULE} module",
        unmanaged.len()
    ));
    hint_activation(ctx);
    Ok(())
}

fn hint_activation(ctx: &CommandContext) {
    let active = ctx
        .host()
        .map(|h| h.manifest.modules.iter().any(|m| m == SYSTEM_MODULE))
        .unwrap_or(false);
    if !active {
        Output::hint(format!("Run: dekl module on {SYSTEM_MODULE}"));
    }
}

/// Replace the module's package list with the captured set.
fn capture_packages(module: &mut ModuleManifest, explicit: &BTreeSet<String>) {
    module.packages = explicit.iter().cloned().collect();
}

/// Append services that are not already in the module.
fn capture_services(module: &mut ModuleManifest, services: &[ServiceKey]) {
    for key in services {
        let exists = module
            .services
            .iter()
            .any(|s| s.unit_name() == key.name && s.is_user() == (key.scope == ServiceScope::User));
        if !exists {
            module.services.push(ServiceEntry::new(
                &key.name,
                key.scope == ServiceScope::User,
                true,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str, scope: ServiceScope) -> ServiceKey {
        ServiceKey {
            name: name.to_string(),
            scope,
        }
    }

    #[test]
    fn test_capture_packages_keeps_services() {
        let mut module = ModuleManifest {
            packages: vec!["old".to_string()],
            services: vec![ServiceEntry::new("sshd", false, true)],
            ..Default::default()
        };
        let explicit: BTreeSet<String> = ["vim", "git"].iter().map(|s| s.to_string()).collect();

        capture_packages(&mut module, &explicit);

        assert_eq!(module.packages, vec!["git".to_string(), "vim".to_string()]);
        assert_eq!(module.services.len(), 1);
    }

    #[test]
    fn test_capture_services_appends_with_scope() {
        let mut module = ModuleManifest {
            services: vec![ServiceEntry::new("sshd", false, true)],
            ..Default::default()
        };

        capture_services(
            &mut module,
            &[
                key("sshd.service", ServiceScope::System),
                key("pipewire.service", ServiceScope::User),
                key("fstrim.timer", ServiceScope::System),
            ],
        );

        assert_eq!(module.services.len(), 3);
        assert!(module.services[1].is_user());
        assert_eq!(module.services[1].unit_name(), "pipewire.service");
        assert_eq!(module.services[2], ServiceEntry::Name("fstrim.timer".to_string()));
    }
}
