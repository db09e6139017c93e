//! `dekl module`: create, activate and inspect modules.

use anyhow::Result;
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;

use super::CommandContext;
use crate::manifest::{DotfilesDecl, HookDecl, ModuleManifest};
use crate::output::Output;

#[derive(Debug, Args)]
pub struct ModuleArgs {
    #[command(subcommand)]
    pub action: ModuleAction,
}

#[derive(Debug, Subcommand)]
pub enum ModuleAction {
    /// List every module, marking the active ones
    #[command(alias = "ls")]
    List,

    /// Create empty module(s)
    New {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Activate module(s) on this host
    On {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Deactivate module(s) on this host
    Off {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Show what a module declares
    Show { name: String },
}

pub fn run(args: ModuleArgs, ctx: &CommandContext) -> Result<()> {
    match args.action {
        ModuleAction::List => list(ctx),
        ModuleAction::New { names } => new(ctx, &names),
        ModuleAction::On { names } => toggle(ctx, &names, true),
        ModuleAction::Off { names } => toggle(ctx, &names, false),
        ModuleAction::Show { name } => show(ctx, &name),
    }
}

fn list(ctx: &CommandContext) -> Result<()> {
    let host = ctx.host()?;
    let available = ctx.layout.available_modules();

    if available.is_empty() {
        Output::info("No modules yet");
        Output::hint("Run: dekl module new <name>");
    }
    for name in &available {
        let module = ModuleManifest::load(&ctx.layout, name)?;
        let marker = if host.manifest.modules.contains(name) {
            "✓".green().to_string()
        } else {
            "○".dimmed().to_string()
        };
        println!(
            "{marker} {name}: {} packages, {} services, {} dotfiles",
            module.packages.len(),
            module.services.len(),
            module.dotfile_count()
        );
    }
    for name in &host.manifest.modules {
        if !available.contains(name) {
            Output::warning(format!("{name}: active but has no module.yaml"));
        }
    }
    Ok(())
}

fn new(ctx: &CommandContext, names: &[String]) -> Result<()> {
    for name in names {
        if ctx.layout.module_dir(name).exists() {
            Output::warning(format!("{name} already exists"));
            continue;
        }
        if ctx.dry_run {
            Output::dry_run(format!("Would create {}", ctx.layout.module_file(name).display()));
            continue;
        }
        ModuleManifest::default().save(&ctx.layout, name)?;
        Output::success(format!("Created {name}"));
    }
    Ok(())
}

fn toggle(ctx: &CommandContext, names: &[String], on: bool) -> Result<()> {
    let mut host = ctx.host()?;
    let mut changed = false;

    for name in names {
        if on {
            if !ctx.layout.module_file(name).exists() {
                Output::warning(format!("{name} not found"));
            } else if host.manifest.activate(name) {
                Output::added(name);
                changed = true;
            } else {
                Output::info(format!("{name} already active"));
            }
        } else if host.manifest.deactivate(name) {
            Output::removed(name);
            changed = true;
        } else {
            Output::info(format!("{name} not active"));
        }
    }

    if changed {
        if ctx.dry_run {
            Output::dry_run(format!("Would update hosts/{}.yaml", host.name));
        } else {
            host.save(&ctx.layout)?;
        }
    }
    Ok(())
}

fn show(ctx: &CommandContext, name: &str) -> Result<()> {
    let module = ModuleManifest::load(&ctx.layout, name)?;
    let active = ctx
        .host()
        .map(|h| h.manifest.modules.iter().any(|m| m == name))
        .unwrap_or(false);

    Output::header(format!(
        "{name} ({})",
        if active { "active" } else { "inactive" }
    ));

    if !module.packages.is_empty() {
        Output::subheader("Packages:");
        for package in &module.packages {
            Output::list_item(package);
        }
    }

    if !module.services.is_empty() {
        Output::subheader("Services:");
        for service in &module.services {
            let user = if service.is_user() { " (user)" } else { "" };
            let disabled = if service.is_enabled() { "" } else { " (disabled)" };
            Output::list_item(format!("{}{user}{disabled}", service.unit_name()));
        }
    }

    match &module.dotfiles {
        Some(DotfilesDecl::Flag(true)) => {
            Output::subheader("Dotfiles:");
            Output::list_item("(all, into ~/.config)");
        }
        Some(DotfilesDecl::Map(map)) if !map.is_empty() => {
            Output::subheader("Dotfiles:");
            for (source, target) in map {
                Output::list_item(format!("{source} -> {target}"));
            }
        }
        _ => {}
    }

    let hooks = [("pre", &module.hooks.pre), ("post", &module.hooks.post)];
    if hooks.iter().any(|(_, h)| h.is_some()) {
        Output::subheader("Hooks:");
        for (phase, decl) in hooks {
            if let Some(decl) = decl {
                Output::list_item(format!("{phase}: {}", describe_hook(decl)));
            }
        }
    }
    Ok(())
}

fn describe_hook(decl: &HookDecl) -> String {
    let mut flags = Vec::new();
    if decl.always() {
        flags.push("always");
    }
    if decl.root() {
        flags.push("root");
    }
    if flags.is_empty() {
        decl.script().to_string()
    } else {
        format!("{} ({})", decl.script(), flags.join(", "))
    }
}
