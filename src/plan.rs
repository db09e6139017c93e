//! Action plans and execution reports.
//!
//! A sync is split into two phases:
//! 1. **Planning**: resolve, query the system and diff, with no side effects
//! 2. **Execution**: apply the plan's operations in phase order
//!
//! Dry-run stops after the first phase and prints [`ActionPlan::describe`].

use owo_colors::OwoColorize;
use serde::Serialize;
use std::fmt;

use crate::diff::{PackagePlan, ServicePlan};
use crate::dotfiles::DotfilePlan;
use crate::hooks::HookId;

// ============================================================================
// Operation Types
// ============================================================================

/// A verb describing an operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verb {
    Install,
    Remove,
    Enable,
    Disable,
    /// Create a symlink
    Link,
    /// Point an existing symlink at a new source
    Relink,
    /// Remove a symlink dekl created
    Unlink,
    /// Run a hook script
    Run,
    /// Full system upgrade
    Upgrade,
    /// Needs manual resolution; never applied
    Blocked,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Install => "Install",
            Verb::Remove => "Remove",
            Verb::Enable => "Enable",
            Verb::Disable => "Disable",
            Verb::Link => "Link",
            Verb::Relink => "Relink",
            Verb::Unlink => "Unlink",
            Verb::Run => "Run",
            Verb::Upgrade => "Upgrade",
            Verb::Blocked => "Blocked",
        }
    }

    /// Get a colored display for this verb.
    pub fn colored(&self) -> String {
        match self {
            Verb::Install | Verb::Enable | Verb::Link => self.as_str().green().to_string(),
            Verb::Remove | Verb::Disable | Verb::Unlink => self.as_str().red().to_string(),
            Verb::Relink | Verb::Upgrade => self.as_str().yellow().to_string(),
            Verb::Run => self.as_str().cyan().to_string(),
            Verb::Blocked => self.as_str().red().bold().to_string(),
        }
    }

    /// Whether the operation changes the machine.
    pub fn is_action(&self) -> bool {
        !matches!(self, Verb::Blocked)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single operation in a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub verb: Verb,
    /// What the operation applies to (`ripgrep`, `sshd.service`, a path).
    pub target: String,
    pub details: Option<String>,
}

impl Operation {
    pub fn new(verb: Verb, target: impl Into<String>) -> Self {
        Self {
            verb,
            target: target.into(),
            details: None,
        }
    }

    pub fn with_details(verb: Verb, target: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            verb,
            target: target.into(),
            details: Some(details.into()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb.colored(), self.target)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details.dimmed())?;
        }
        Ok(())
    }
}

// ============================================================================
// Plan Summary
// ============================================================================

/// One titled section of a plan, for display.
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub summary: String,
    pub operations: Vec<Operation>,
}

impl PlanSummary {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            operations: Vec::new(),
        }
    }

    pub fn add_operation(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub fn add_operations(&mut self, ops: impl IntoIterator<Item = Operation>) {
        self.operations.extend(ops);
    }

    /// Count of operations that change the machine.
    pub fn action_count(&self) -> usize {
        self.operations.iter().filter(|o| o.verb.is_action()).count()
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary.bold())?;

        if self.operations.is_empty() {
            writeln!(f, "  {}", "No operations".dimmed())?;
        } else {
            for op in &self.operations {
                writeln!(f, "  ▸ {}", op)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Action Plan
// ============================================================================

/// Everything a sync intends to do, computed before anything runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionPlan {
    pub packages: PackagePlan,
    pub services: ServicePlan,
    pub dotfiles: DotfilePlan,
    /// Hooks that will fire, in firing order.
    pub hooks: Vec<HookId>,
}

impl ActionPlan {
    /// True when there is nothing to change and no hook is due.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
            && self.services.is_empty()
            && self.dotfiles.is_empty()
            && self.hooks.is_empty()
    }

    /// Sections for display, skipping those with nothing to show.
    pub fn describe(&self) -> Vec<PlanSummary> {
        let mut sections = Vec::new();

        let mut packages = PlanSummary::new("Packages");
        packages.add_operations(
            self.packages
                .to_install
                .iter()
                .map(|p| Operation::new(Verb::Install, p)),
        );
        packages.add_operations(
            self.packages
                .to_remove
                .iter()
                .map(|p| Operation::new(Verb::Remove, p)),
        );
        sections.push(packages);

        let mut services = PlanSummary::new("Services");
        services.add_operations(
            self.services
                .to_enable
                .iter()
                .map(|s| Operation::new(Verb::Enable, s.to_string())),
        );
        services.add_operations(
            self.services
                .to_disable
                .iter()
                .map(|s| Operation::new(Verb::Disable, s.to_string())),
        );
        sections.push(services);

        let dotfiles = &self.dotfiles;
        let mut links = PlanSummary::new("Dotfiles");
        links.add_operations(
            dotfiles
                .create
                .iter()
                .map(|i| Operation::new(Verb::Link, i.label())),
        );
        links.add_operations(dotfiles.replace.iter().map(|r| {
            Operation::with_details(
                Verb::Relink,
                r.intent.label(),
                format!("was {}", r.current.display()),
            )
        }));
        links.add_operations(dotfiles.remove.iter().map(|s| {
            Operation::with_details(
                Verb::Unlink,
                s.target.display().to_string(),
                "no longer declared",
            )
        }));
        links.add_operations(dotfiles.blocked.iter().map(|b| {
            Operation::with_details(
                Verb::Blocked,
                b.intent.target.display().to_string(),
                "a real file or directory is in the way",
            )
        }));
        sections.push(links);

        let mut hooks = PlanSummary::new("Hooks");
        hooks.add_operations(self.hooks.iter().map(|h| Operation::new(Verb::Run, h.to_string())));
        sections.push(hooks);

        sections.retain(|s| !s.operations.is_empty());
        sections
    }

    /// Number of operations that change the machine.
    pub fn action_count(&self) -> usize {
        self.describe().iter().map(PlanSummary::action_count).sum()
    }
}

// ============================================================================
// Execution Report
// ============================================================================

/// Result of a single operation execution.
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub operation: Operation,
    pub success: bool,
    pub error: Option<String>,
}

impl OperationResult {
    pub fn success(operation: Operation) -> Self {
        Self {
            operation,
            success: true,
            error: None,
        }
    }

    pub fn failure(operation: Operation, error: impl Into<String>) -> Self {
        Self {
            operation,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Report of plan execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub results: Vec<OperationResult>,
}

impl ExecutionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, verb: Verb, target: impl Into<String>) {
        self.results
            .push(OperationResult::success(Operation::new(verb, target)));
    }

    pub fn record_failure(
        &mut self,
        verb: Verb,
        target: impl Into<String>,
        error: impl Into<String>,
    ) {
        self.results.push(OperationResult::failure(
            Operation::new(verb, target),
            error,
        ));
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| !r.success)
    }

    /// Failed operations, in execution order.
    pub fn failures(&self) -> impl Iterator<Item = &OperationResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let success = self.success_count();
        let failed = self.failure_count();

        if failed == 0 {
            writeln!(
                f,
                "{}",
                format!("✓ {} operation(s) completed", success).green()
            )?;
        } else {
            writeln!(
                f,
                "{}",
                format!("⚠ {} succeeded, {} failed", success, failed).yellow()
            )?;
            writeln!(f)?;
            writeln!(f, "Failures:")?;
            for result in self.failures() {
                writeln!(
                    f,
                    "  {} {} {}: {}",
                    "✗".red(),
                    result.operation.verb,
                    result.operation.target,
                    result.error.as_deref().unwrap_or("Unknown error")
                )?;
            }
        }

        Ok(())
    }
}
