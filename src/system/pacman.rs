//! pacman adapter, fronted by an AUR helper for transactions.

use anyhow::{Context, Result, bail};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{ItemOutcome, PackageManager, elevated, parse_lines};
use crate::command_runner::{CommandOptions, CommandRunner};
use crate::manifest::AurHelper;

pub struct Pacman {
    helper: AurHelper,
    runner: Arc<dyn CommandRunner>,
}

impl Pacman {
    pub fn new(helper: AurHelper, runner: Arc<dyn CommandRunner>) -> Self {
        Self { helper, runner }
    }

    fn query(&self, flags: &str) -> Result<std::process::Output> {
        self.runner
            .run_output("pacman", &[flags], &CommandOptions::default())
            .with_context(|| format!("Failed to run pacman {flags}"))
    }

    /// Every installed package, explicit or not.
    fn all_packages(&self) -> Result<BTreeSet<String>> {
        let output = self.query("-Qq")?;
        if !output.status.success() {
            bail!("pacman -Qq failed");
        }
        Ok(parse_lines(&output.stdout))
    }

    /// Run the helper with `args`, escalating when the helper is plain pacman.
    fn transaction(&self, args: &[&str]) -> Result<bool> {
        let helper = self.helper.as_str();
        let (program, full) = if self.helper.needs_sudo() {
            elevated(helper, args)
        } else {
            (helper, args.to_vec())
        };
        let status = self
            .runner
            .run_status(program, &full, &CommandOptions::default())
            .with_context(|| format!("Failed to run {helper}"))?;
        Ok(status.success())
    }

    /// Run a batch transaction; on failure retry each item alone so one bad
    /// name does not sink the rest.
    fn per_item(&self, flags: &[&str], packages: &[String], verb: &str) -> Vec<ItemOutcome> {
        let mut args = flags.to_vec();
        args.extend(packages.iter().map(String::as_str));
        if let Ok(true) = self.transaction(&args) {
            return packages.iter().map(ItemOutcome::ok).collect();
        }

        if packages.len() > 1 {
            tracing::debug!(count = packages.len(), "Batch {verb} failed, retrying one by one");
        }
        packages
            .iter()
            .map(|package| {
                let mut args = flags.to_vec();
                args.push(package);
                match self.transaction(&args) {
                    Ok(true) => ItemOutcome::ok(package),
                    Ok(false) => ItemOutcome::failed(package, format!("{verb} failed")),
                    Err(e) => ItemOutcome::failed(package, e.to_string()),
                }
            })
            .collect()
    }

    /// Promote already-installed dependencies to explicit.
    fn mark_explicit(&self, packages: &[&str]) -> Result<bool> {
        let mut args = vec!["-D", "--asexplicit"];
        args.extend_from_slice(packages);
        let (program, full) = elevated("pacman", &args);
        let status = self
            .runner
            .run_status(program, &full, &CommandOptions::default())
            .context("Failed to run pacman -D")?;
        Ok(status.success())
    }
}

impl PackageManager for Pacman {
    fn explicit_packages(&self) -> Result<BTreeSet<String>> {
        let output = self.query("-Qqe")?;
        if !output.status.success() {
            bail!(
                "pacman -Qqe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(parse_lines(&output.stdout))
    }

    fn orphan_packages(&self) -> Result<BTreeSet<String>> {
        // Exits 1 when there are no orphans.
        let output = self.query("-Qdtq")?;
        if !output.status.success() {
            return Ok(BTreeSet::new());
        }
        Ok(parse_lines(&output.stdout))
    }

    fn install(&self, packages: &[String]) -> Vec<ItemOutcome> {
        if packages.is_empty() {
            return Vec::new();
        }

        // Packages pulled in as dependencies are already on disk; installing
        // them again would leave them non-explicit and out of -Qqe.
        let present = self.all_packages().unwrap_or_default();
        let (deps, fresh): (Vec<&String>, Vec<&String>) =
            packages.iter().partition(|p| present.contains(*p));

        let mut outcomes = Vec::with_capacity(packages.len());
        if !deps.is_empty() {
            let names: Vec<&str> = deps.iter().map(|p| p.as_str()).collect();
            let marked = self.mark_explicit(&names);
            for package in deps {
                outcomes.push(match &marked {
                    Ok(true) => ItemOutcome::ok(package),
                    Ok(false) => ItemOutcome::failed(package, "could not mark as explicit"),
                    Err(e) => ItemOutcome::failed(package, e.to_string()),
                });
            }
        }

        if !fresh.is_empty() {
            let fresh: Vec<String> = fresh.into_iter().cloned().collect();
            outcomes.extend(self.per_item(&["-S", "--needed"], &fresh, "install"));
        }
        outcomes
    }

    fn remove(&self, packages: &[String]) -> Vec<ItemOutcome> {
        if packages.is_empty() {
            return Vec::new();
        }
        self.per_item(&["-Rsu", "--noconfirm"], packages, "removal")
    }

    fn upgrade(&self) -> Result<()> {
        if !self.transaction(&["-Syu"])? {
            bail!("{} -Syu failed", self.helper);
        }
        Ok(())
    }
}
