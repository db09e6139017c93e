//! CLI argument definitions for dekl.
//!
//! Kept apart from `main.rs` so completion generation and the command
//! modules can reference these types.

use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Debug, Parser)]
#[command(name = "dekl")]
#[command(about = "Declarative Arch Linux system manager")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show what would be done without making changes
    #[arg(long, short = 'n', global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the configuration directory, host file and base module
    Init(commands::init::InitArgs),

    /// Capture installed packages (or enabled services) into the system module
    Merge(commands::merge::MergeArgs),

    /// Show the difference between declared and current state
    Status(commands::status::StatusArgs),

    /// Converge packages, services and dotfiles, running hooks around them
    Sync(commands::sync::SyncArgs),

    /// Upgrade the system, running update hooks around it
    Update(commands::update::UpdateArgs),

    /// Add packages to a module and install them
    Add(commands::add::AddArgs),

    /// Remove packages from every active module and uninstall them
    Drop(commands::drop::DropArgs),

    /// Declare services in a module and enable them
    Enable(commands::enable::EnableArgs),

    /// Mark services disabled (or remove them) and disable them
    Disable(commands::disable::DisableArgs),

    /// Inspect, run and reset lifecycle hooks
    Hook(commands::hook::HookArgs),

    /// Create, activate and inspect modules
    #[command(alias = "mod")]
    Module(commands::module::ModuleArgs),

    /// Generate shell completions
    Completions(commands::completions::CompletionsArgs),

    /// Generate JSON schemas for the YAML manifests
    Schema(commands::schema::SchemaArgs),
}
