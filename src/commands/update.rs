//! `dekl update`: full system upgrade wrapped in the host's update hooks.

use anyhow::Result;
use clap::Args;

use super::{CommandContext, finish_run, system_for};
use crate::output::Output;
use crate::resolve;
use crate::sync::{self, SyncContext, SyncOptions};

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Skip pre_update and post_update hooks
    #[arg(long)]
    pub no_hooks: bool,
}

pub fn run(args: UpdateArgs, ctx: &CommandContext) -> Result<()> {
    let layout = &ctx.layout;
    let (host, declared) = resolve::load_declared(layout)?;
    let system = system_for(&host.manifest);
    let opts = SyncOptions {
        dry_run: ctx.dry_run,
        no_hooks: args.no_hooks,
        ..Default::default()
    };
    let sync_ctx = SyncContext {
        layout,
        host: &host.manifest,
        declared: &declared,
        system: &system,
    };

    Output::header(format!("Updating host {}", host.name));
    let result = sync::with_store(&layout.state_file(), opts.dry_run, |store| {
        if opts.dry_run {
            if !opts.no_hooks {
                for hook in sync::update_hooks(&declared, store) {
                    Output::dry_run(format!("Would run hook {}", hook.id));
                }
            }
            Output::dry_run("Would run a full system upgrade");
            return Ok(None);
        }
        sync::update(&sync_ctx, store, &opts).map(Some)
    })?;

    match result {
        Some(report) => finish_run(report, "Update complete"),
        None => Ok(()),
    }
}
