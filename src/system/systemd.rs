//! systemctl adapter for system and user units.

use anyhow::{Context, Result, bail};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{ServiceController, elevated};
use crate::command_runner::{CommandOptions, CommandRunner};
use crate::resolve::ServiceScope;

pub struct Systemctl {
    runner: Arc<dyn CommandRunner>,
}

impl Systemctl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn toggle(&self, verb: &str, unit: &str, scope: ServiceScope) -> Result<()> {
        let status = match scope {
            ServiceScope::User => self.runner.run_status(
                "systemctl",
                &["--user", verb, "--now", unit],
                &CommandOptions::default(),
            ),
            ServiceScope::System => {
                let (program, args) = elevated("systemctl", &[verb, "--now", unit]);
                self.runner
                    .run_status(program, &args, &CommandOptions::default())
            }
        }
        .with_context(|| format!("Failed to run systemctl {verb}"))?;

        if !status.success() {
            bail!("systemctl {verb} {unit} failed");
        }
        Ok(())
    }
}

/// First column of `list-unit-files --no-legend` output.
fn parse_unit_files(stdout: &[u8]) -> BTreeSet<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(String::from)
        .collect()
}

/// Some systemd versions exit non-zero when nothing matches the filter.
/// That is the only failure read as "no units".
fn is_empty_listing(stdout: &[u8], stderr: &[u8]) -> bool {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let quiet = |s: &str| s.trim().is_empty() || s.trim().starts_with("0 unit files listed");
    quiet(&stdout) && quiet(&stderr)
}

impl ServiceController for Systemctl {
    fn enabled_units(&self, scope: ServiceScope) -> Result<BTreeSet<String>> {
        let mut args = vec![
            "list-unit-files",
            "--type=service,socket,timer",
            "--state=enabled",
            "--no-legend",
        ];
        if scope == ServiceScope::User {
            args.insert(0, "--user");
        }
        let output = self
            .runner
            .run_output("systemctl", &args, &CommandOptions::default())
            .context("Failed to run systemctl list-unit-files")?;

        if !output.status.success() && !is_empty_listing(&output.stdout, &output.stderr) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("systemctl list-unit-files failed: {}", stderr.trim());
        }
        Ok(parse_unit_files(&output.stdout))
    }

    fn enable(&self, unit: &str, scope: ServiceScope) -> Result<()> {
        self.toggle("enable", unit, scope)
    }

    fn disable(&self, unit: &str, scope: ServiceScope) -> Result<()> {
        self.toggle("disable", unit, scope)
    }
}
