//! Property-based tests for the convergence engine.
//!
//! These use proptest to generate random declared/actual states and check
//! that resolution and diffing keep their invariants.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use dekl::diff::{ActualState, diff, diff_packages, diff_services};
use dekl::manifest::{HostManifest, ModuleManifest, ServiceEntry, normalize_service_name};
use dekl::paths::Layout;
use dekl::resolve::{self, ServiceKey, ServiceScope};

fn package_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,8}"
}

fn package_set() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(package_strategy(), 0..12)
}

fn service_strategy() -> impl Strategy<Value = ServiceEntry> {
    ("[a-z]{1,6}", any::<bool>(), any::<bool>())
        .prop_map(|(name, user, enabled)| ServiceEntry::new(&name, user, enabled))
}

fn module_strategy() -> impl Strategy<Value = ModuleManifest> {
    (
        prop::collection::vec(package_strategy(), 0..6),
        prop::collection::vec(service_strategy(), 0..4),
    )
        .prop_map(|(packages, services)| ModuleManifest {
            packages,
            services,
            ..Default::default()
        })
}

fn scope_strategy() -> impl Strategy<Value = ServiceScope> {
    prop_oneof![Just(ServiceScope::System), Just(ServiceScope::User)]
}

fn enabled_strategy() -> impl Strategy<Value = BTreeSet<ServiceKey>> {
    prop::collection::btree_set(
        ("[a-z]{1,6}", scope_strategy()).prop_map(|(name, scope)| ServiceKey {
            name: normalize_service_name(&name),
            scope,
        }),
        0..8,
    )
}

/// Modules named m0..mN, all selected in order.
fn host_and_modules(
    modules: Vec<ModuleManifest>,
) -> (HostManifest, BTreeMap<String, ModuleManifest>) {
    let named: BTreeMap<String, ModuleManifest> = modules
        .into_iter()
        .enumerate()
        .map(|(i, m)| (format!("m{i}"), m))
        .collect();
    let host = HostManifest {
        modules: (0..named.len()).map(|i| format!("m{i}")).collect(),
        ..Default::default()
    };
    (host, named)
}

proptest! {
    #[test]
    fn install_and_remove_are_disjoint(declared in package_set(), installed in package_set()) {
        let plan = diff_packages(&declared, &installed, true);

        let to_install: BTreeSet<_> = plan.to_install.iter().cloned().collect();
        let to_remove: BTreeSet<_> = plan.to_remove.iter().cloned().collect();
        prop_assert!(to_install.is_disjoint(&to_remove));

        let expected: BTreeSet<_> = declared.difference(&installed).cloned().collect();
        prop_assert_eq!(to_install, expected);
        prop_assert!(to_remove.iter().all(|p| installed.contains(p) && !declared.contains(p)));
    }

    #[test]
    fn no_prune_never_removes(declared in package_set(), installed in package_set()) {
        let plan = diff_packages(&declared, &installed, false);
        prop_assert!(plan.to_remove.is_empty());
        prop_assert!(plan.undeclared.iter().all(|p| !declared.contains(p)));
    }

    #[test]
    fn applying_package_plan_converges(declared in package_set(), installed in package_set()) {
        let plan = diff_packages(&declared, &installed, true);

        let mut after = installed.clone();
        after.extend(plan.to_install.iter().cloned());
        for package in &plan.to_remove {
            after.remove(package);
        }

        prop_assert_eq!(&after, &declared);
        prop_assert!(diff_packages(&declared, &after, true).is_empty());
    }

    #[test]
    fn every_package_has_provenance(modules in prop::collection::vec(module_strategy(), 0..5)) {
        let layout = Layout::new("/nonexistent/dekl", "/nonexistent/home");
        let (host, available) = host_and_modules(modules);
        let state = resolve::resolve(&layout, &host, &available).unwrap();

        for (package, owners) in &state.packages {
            prop_assert!(!owners.is_empty());
            for owner in owners {
                prop_assert!(available[owner].packages.contains(package));
            }
        }
        let union: BTreeSet<String> = available
            .values()
            .flat_map(|m| m.packages.iter().cloned())
            .collect();
        prop_assert_eq!(state.package_set(), union);
    }

    #[test]
    fn later_module_wins_service_declaration(
        modules in prop::collection::vec(module_strategy(), 1..5),
    ) {
        let layout = Layout::new("/nonexistent/dekl", "/nonexistent/home");
        let (host, available) = host_and_modules(modules);
        let state = resolve::resolve(&layout, &host, &available).unwrap();

        for (key, spec) in &state.services {
            // The last declaration in host order decides.
            let last = host
                .modules
                .iter()
                .flat_map(|name| available[name].services.iter())
                .filter(|s| {
                    s.unit_name() == key.name
                        && ServiceScope::from_user_flag(s.is_user()) == key.scope
                })
                .last();
            prop_assert_eq!(last.map(ServiceEntry::is_enabled), Some(spec.enabled));
        }
    }

    #[test]
    fn applying_service_plan_converges(
        modules in prop::collection::vec(module_strategy(), 0..4),
        enabled in enabled_strategy(),
    ) {
        let layout = Layout::new("/nonexistent/dekl", "/nonexistent/home");
        let (host, available) = host_and_modules(modules);
        let state = resolve::resolve(&layout, &host, &available).unwrap();

        let plan = diff_services(&state.services, &enabled);
        for key in plan.to_enable.iter().chain(&plan.to_disable) {
            prop_assert!(state.services.contains_key(key));
        }

        let mut after = enabled.clone();
        after.extend(plan.to_enable.iter().cloned());
        for key in &plan.to_disable {
            after.remove(key);
        }
        let actual = ActualState {
            installed: state.package_set(),
            enabled: after,
        };
        let (packages, services) = diff(&state, &actual, true);
        prop_assert!(packages.is_empty());
        prop_assert!(services.is_empty());
    }

    #[test]
    fn service_names_normalize_once(name in "[a-z]{1,8}(\\.service|\\.socket|\\.timer)?") {
        let once = normalize_service_name(&name);
        prop_assert_eq!(normalize_service_name(&once), once.clone());
        prop_assert!(
            once.ends_with(".service") || once.ends_with(".socket") || once.ends_with(".timer")
        );
    }
}

#[test]
fn auto_prune_off_keeps_undeclared() {
    let host: HostManifest = serde_yaml::from_str("modules: []\nauto_prune: false\n").unwrap();
    let declared: BTreeSet<String> = ["git".to_string()].into();
    let installed: BTreeSet<String> = ["git".to_string(), "htop".to_string()].into();

    let plan = diff_packages(&declared, &installed, host.prune_enabled(None));
    assert!(plan.to_remove.is_empty());
    assert_eq!(plan.undeclared, vec!["htop".to_string()]);
}
