//! Diff engine for packages and services.
//!
//! Pure functions over a [`DeclaredState`] and an [`ActualState`] snapshot.
//! Every list in the output is sorted so plans display and compare
//! reproducibly.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::resolve::{DeclaredState, ServiceKey, ServiceSpec};

/// What collaborators report as currently true on the machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActualState {
    /// Explicitly installed packages.
    pub installed: BTreeSet<String>,
    /// Currently enabled units.
    pub enabled: BTreeSet<ServiceKey>,
}

/// Result of comparing two sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDiff<T> {
    /// In `wanted` but not in `have`.
    pub missing: Vec<T>,
    /// In `have` but not in `wanted`.
    pub extra: Vec<T>,
}

/// Compare two ordered sets.
pub fn diff_sets<T: Ord + Clone>(wanted: &BTreeSet<T>, have: &BTreeSet<T>) -> SetDiff<T> {
    SetDiff {
        missing: wanted.difference(have).cloned().collect(),
        extra: have.difference(wanted).cloned().collect(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackagePlan {
    pub to_install: Vec<String>,
    /// Populated only when pruning is enabled.
    pub to_remove: Vec<String>,
    /// Installed but undeclared, whether or not pruning will remove them.
    pub undeclared: Vec<String>,
}

impl PackagePlan {
    pub fn is_empty(&self) -> bool {
        self.to_install.is_empty() && self.to_remove.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServicePlan {
    pub to_enable: Vec<ServiceKey>,
    pub to_disable: Vec<ServiceKey>,
}

impl ServicePlan {
    pub fn is_empty(&self) -> bool {
        self.to_enable.is_empty() && self.to_disable.is_empty()
    }
}

/// Plan package installs and (optionally) removals.
pub fn diff_packages(
    declared: &BTreeSet<String>,
    installed: &BTreeSet<String>,
    prune: bool,
) -> PackagePlan {
    let diff = diff_sets(declared, installed);
    PackagePlan {
        to_install: diff.missing,
        to_remove: if prune { diff.extra.clone() } else { Vec::new() },
        undeclared: diff.extra,
    }
}

/// Plan service enables and disables.
///
/// Only declared services are considered: a unit that no module mentions is
/// never disabled, even if it is enabled on the machine.
pub fn diff_services(
    declared: &BTreeMap<ServiceKey, ServiceSpec>,
    enabled: &BTreeSet<ServiceKey>,
) -> ServicePlan {
    let mut plan = ServicePlan::default();
    for (key, spec) in declared {
        let is_enabled = enabled.contains(key);
        if spec.enabled && !is_enabled {
            plan.to_enable.push(key.clone());
        } else if !spec.enabled && is_enabled {
            plan.to_disable.push(key.clone());
        }
    }
    plan
}

/// Package and service plan for a declared/actual pair.
pub fn diff(
    declared: &DeclaredState,
    actual: &ActualState,
    prune: bool,
) -> (PackagePlan, ServicePlan) {
    (
        diff_packages(&declared.package_set(), &actual.installed, prune),
        diff_services(&declared.services, &actual.enabled),
    )
}
