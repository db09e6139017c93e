//! `dekl sync`: converge the machine toward its declaration.

use anyhow::{Result, bail};
use clap::Args;

use super::{CommandContext, finish_run, print_warnings, prune_override, system_for};
use crate::aur::{self, HelperStatus};
use crate::command_runner::RealCommandRunner;
use crate::manifest::AurHelper;
use crate::output::Output;
use crate::resolve;
use crate::sync::{self, SyncContext, SyncOptions};
use crate::system::{CliPrompter, Prompter};

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Remove undeclared packages (overrides auto_prune)
    #[arg(long, overrides_with = "no_prune")]
    pub prune: bool,

    /// Keep undeclared packages (overrides auto_prune)
    #[arg(long)]
    pub no_prune: bool,

    /// Skip confirmation prompts
    #[arg(long, short)]
    pub yes: bool,

    /// Skip all hooks
    #[arg(long)]
    pub no_hooks: bool,

    /// Skip dotfile symlinks
    #[arg(long)]
    pub no_dotfiles: bool,

    /// Skip service enables and disables
    #[arg(long)]
    pub no_services: bool,
}

impl SyncArgs {
    fn options(&self, dry_run: bool) -> SyncOptions {
        SyncOptions {
            dry_run,
            prune: prune_override(self.prune, self.no_prune),
            yes: self.yes,
            no_hooks: self.no_hooks,
            no_dotfiles: self.no_dotfiles,
            no_services: self.no_services,
        }
    }
}

pub fn run(args: SyncArgs, ctx: &CommandContext) -> Result<()> {
    let layout = &ctx.layout;
    let opts = args.options(ctx.dry_run);
    let host = ctx.host()?;

    let missing = resolve::missing_modules(layout, &host.manifest);
    if !missing.is_empty() {
        Output::error("Missing modules:");
        for module in &missing {
            Output::list_item(module);
        }
        Output::hint("Fix the host file or create them with: dekl module new <name>");
        bail!("Missing modules: {}", missing.join(", "));
    }

    let modules = resolve::load_modules(layout, &host.manifest)?;
    let declared = resolve::resolve(layout, &host.manifest, &modules)?;
    print_warnings(&declared.warnings);

    ensure_helper(host.manifest.aur_helper, &opts)?;
    let system = system_for(&host.manifest);
    let sync_ctx = SyncContext {
        layout,
        host: &host.manifest,
        declared: &declared,
        system: &system,
    };

    Output::header(format!("Syncing host {}", host.name));
    let result = sync::with_store(&layout.state_file(), opts.dry_run, |store| {
        let (plan, warnings) = sync::plan(&sync_ctx, store, &opts)?;
        print_warnings(&warnings);

        let sections = plan.describe();
        for section in &sections {
            Output::blank();
            print!("{section}");
        }
        if sections.is_empty() {
            sync::reconcile_links(store, &plan.dotfiles);
            Output::success("System is in sync");
            return Ok(None);
        }

        if opts.dry_run {
            Output::blank();
            Output::dry_run(format!(
                "{} operation(s) planned; no changes made",
                plan.action_count()
            ));
            return Ok(None);
        }

        Output::blank();
        sync::execute(&sync_ctx, store, &plan, &opts).map(Some)
    })?;

    match result {
        Some(report) => finish_run(report, "Sync complete"),
        None => Ok(()),
    }
}

/// Make sure the configured AUR helper is installed, offering to bootstrap it.
///
/// Declining is fine when another helper is installed (it is used instead);
/// with no helper at all the sync cannot install AUR packages, so it stops.
fn ensure_helper(configured: AurHelper, opts: &SyncOptions) -> Result<()> {
    let runner = RealCommandRunner;
    let status = aur::helper_status(&runner, configured);
    let fallback = match status {
        HelperStatus::Ready(_) => return Ok(()),
        HelperStatus::Substitute { available, .. } => {
            Output::warning(format!(
                "Configured helper {configured} is not installed, but {available} is"
            ));
            Some(available)
        }
        HelperStatus::Missing(_) => {
            Output::warning("No AUR helper found");
            None
        }
    };

    if opts.dry_run {
        Output::dry_run(format!("Would bootstrap {configured}"));
        return Ok(());
    }

    let question = format!("Bootstrap {configured} from the AUR?");
    if opts.yes || CliPrompter.confirm(&question)? {
        return aur::bootstrap(&runner, configured);
    }

    match fallback {
        Some(available) => {
            Output::info(format!("Continuing with {available}"));
            Ok(())
        }
        None => {
            Output::hint(format!(
                "Install {configured} manually, or set aur_helper: pacman in the host file"
            ));
            bail!("No AUR helper available and {configured} is configured")
        }
    }
}
