//! `dekl init`: scaffold the configuration directory.

use anyhow::{Context, Result};
use clap::Args;
use is_terminal::IsTerminal;
use std::fs;
use std::path::PathBuf;

use super::CommandContext;
use crate::manifest::{AurHelper, HostManifest, ModuleManifest, RootConfig};
use crate::output::Output;
use crate::paths::Layout;

const GITIGNORE: &str = "state.yaml\nmodules/system/\n";

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Host name (defaults to the machine's hostname)
    #[arg(long, short = 'H')]
    pub host: Option<String>,

    /// Package frontend for a new host file (prompts when omitted)
    #[arg(long, value_enum)]
    pub aur_helper: Option<AurHelper>,
}

pub fn run(args: InitArgs, ctx: &CommandContext) -> Result<()> {
    let host = match args.host {
        Some(host) => host,
        None => whoami::fallible::hostname().context("Failed to read hostname; pass --host")?,
    };
    let layout = &ctx.layout;

    let helper = if layout.host_file(&host).exists() {
        None
    } else {
        Some(match args.aur_helper {
            Some(helper) => helper,
            None => choose_helper()?,
        })
    };

    let created = scaffold(layout, &host, helper, ctx.dry_run)?;
    for path in &created {
        if ctx.dry_run {
            Output::dry_run(format!("Would create {}", path.display()));
        } else {
            Output::success(format!("Created {}", path.display()));
        }
    }
    if created.is_empty() {
        Output::info(format!(
            "Configuration already exists in {}",
            layout.root().display()
        ));
    }

    Output::header(format!("Initialized dekl for host: {host}"));
    Output::subheader("Next steps:");
    Output::step("dekl merge        capture installed packages into the system module");
    Output::step(format!(
        "edit modules in  {}",
        layout.modules_dir().display()
    ));
    Output::step("dekl status       see what would change");
    Output::step("dekl sync         apply it");
    Ok(())
}

fn choose_helper() -> Result<AurHelper> {
    if !std::io::stdin().is_terminal() {
        let helper = AurHelper::default();
        Output::info(format!("Non-interactive mode detected; using {helper}"));
        return Ok(helper);
    }
    cliclack::select("Select a package frontend")
        .item(AurHelper::Paru, "paru", "recommended")
        .item(AurHelper::Yay, "yay", "")
        .item(AurHelper::Pacman, "pacman", "no AUR support")
        .initial_value(AurHelper::Paru)
        .interact()
        .context("Failed to read selection")
}

/// Create whatever is missing. Existing files are never touched. Returns the
/// paths created (or that would be, in a dry run).
fn scaffold(
    layout: &Layout,
    host: &str,
    helper: Option<AurHelper>,
    dry_run: bool,
) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();

    if !dry_run {
        fs::create_dir_all(layout.hosts_dir())
            .with_context(|| format!("Failed to create {}", layout.hosts_dir().display()))?;
        fs::create_dir_all(layout.modules_dir())
            .with_context(|| format!("Failed to create {}", layout.modules_dir().display()))?;
    }

    let config = layout.config_file();
    if !config.exists() {
        if !dry_run {
            RootConfig {
                host: Some(host.to_string()),
            }
            .save(layout)?;
        }
        created.push(config);
    }

    let host_file = layout.host_file(host);
    if let Some(aur_helper) = helper.filter(|_| !host_file.exists()) {
        if !dry_run {
            HostManifest {
                modules: vec!["base".to_string()],
                aur_helper,
                ..Default::default()
            }
            .save(layout, host)?;
        }
        created.push(host_file);
    }

    let base = layout.module_file("base");
    if !base.exists() {
        if !dry_run {
            ModuleManifest {
                packages: vec!["base".to_string()],
                ..Default::default()
            }
            .save(layout, "base")?;
        }
        created.push(base);
    }

    let gitignore = layout.root().join(".gitignore");
    if !gitignore.exists() {
        if !dry_run {
            fs::write(&gitignore, GITIGNORE)
                .with_context(|| format!("Failed to write {}", gitignore.display()))?;
        }
        created.push(gitignore);
    }

    Ok(created)
}
