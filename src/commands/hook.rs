//! `dekl hook`: inspect, force-run and reset lifecycle hooks.

use anyhow::Result;
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use std::sync::Arc;

use super::CommandContext;
use crate::command_runner::RealCommandRunner;
use crate::error::DeklError;
use crate::hooks::{self, Hook, HookId, ResetTarget};
use crate::output::Output;
use crate::resolve;
use crate::state::HookStore;
use crate::sync;
use crate::system::BashScripts;

#[derive(Debug, Args)]
pub struct HookArgs {
    #[command(subcommand)]
    pub action: HookAction,
}

#[derive(Debug, Subcommand)]
pub enum HookAction {
    /// List declared hooks and whether they have run
    List,

    /// Run a hook now, ignoring its history
    Run {
        /// Hook identity, e.g. neovim:post or host:post_sync
        hook: HookId,
    },

    /// Forget a hook's history so the next sync runs it again
    Reset {
        /// A hook (neovim:post), a module (neovim) or `host`
        target: ResetTarget,
    },
}

pub fn run(args: HookArgs, ctx: &CommandContext) -> Result<()> {
    match args.action {
        HookAction::List => list(ctx),
        HookAction::Run { hook } => run_hook(ctx, &hook),
        HookAction::Reset { target } => reset(ctx, &target),
    }
}

fn list(ctx: &CommandContext) -> Result<()> {
    let (_, declared) = resolve::load_declared(&ctx.layout)?;
    let store = HookStore::load(&ctx.layout.state_file())?;

    if declared.hooks.is_empty() {
        Output::info("No hooks declared");
        return Ok(());
    }

    Output::header("Hooks");
    for hook in &declared.hooks {
        let status = describe_state(&store, hook);
        let root = if hook.root { " (root)" } else { "" };
        Output::list_item(format!("{:<24} {status}{root}", hook.id.to_string()));
        tracing::debug!(hook = %hook.id, script = %hook.script.display(), "Declared hook");
    }
    Ok(())
}

fn describe_state(store: &HookStore, hook: &Hook) -> String {
    if hook.always {
        return "always".cyan().to_string();
    }
    match store.hook_record(&hook.id) {
        Some(record) => format!("ran {}", record.ran_at.format("%Y-%m-%d %H:%M"))
            .green()
            .to_string(),
        None => "pending".yellow().to_string(),
    }
}

fn run_hook(ctx: &CommandContext, id: &HookId) -> Result<()> {
    let (_, declared) = resolve::load_declared(&ctx.layout)?;
    let hook = declared.hook(id).ok_or_else(|| DeklError::UnknownHook {
        name: id.to_string(),
    })?;

    if ctx.dry_run {
        Output::dry_run(format!("Would run {} ({})", hook.id, hook.script.display()));
        return Ok(());
    }

    let scripts = BashScripts::new(Arc::new(RealCommandRunner));
    sync::with_store(&ctx.layout.state_file(), false, |store| {
        Output::info(format!("Running hook {}", hook.id));
        hooks::run_now(store, &scripts, hook)?;
        Output::success(format!("Hook completed: {}", hook.id));
        Ok(())
    })
}

fn reset(ctx: &CommandContext, target: &ResetTarget) -> Result<()> {
    sync::with_store(&ctx.layout.state_file(), ctx.dry_run, |store| {
        let cleared = hooks::reset(store, target);
        if cleared.is_empty() {
            Output::info("No recorded runs to reset");
        }
        for id in &cleared {
            if ctx.dry_run {
                Output::dry_run(format!("Would reset {id}"));
            } else {
                Output::success(format!("Reset {id}"));
            }
        }
        Ok(())
    })
}
