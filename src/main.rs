use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dekl::commands::{self, CommandContext};
use dekl::{Cli, Commands};

fn main() -> Result<()> {
    // e.g., RUST_LOG=dekl=debug
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = CommandContext::from_cli(&cli);

    tracing::debug!(
        config_dir = %ctx.layout.root().display(),
        dry_run = ctx.dry_run,
        "Starting"
    );

    match cli.command {
        Commands::Init(args) => commands::init::run(args, &ctx),
        Commands::Merge(args) => commands::merge::run(args, &ctx),
        Commands::Status(args) => commands::status::run(args, &ctx),
        Commands::Sync(args) => commands::sync::run(args, &ctx),
        Commands::Update(args) => commands::update::run(args, &ctx),
        Commands::Add(args) => commands::add::run(args, &ctx),
        Commands::Drop(args) => commands::drop::run(args, &ctx),
        Commands::Enable(args) => commands::enable::run(args, &ctx),
        Commands::Disable(args) => commands::disable::run(args, &ctx),
        Commands::Hook(args) => commands::hook::run(args, &ctx),
        Commands::Module(args) => commands::module::run(args, &ctx),
        Commands::Completions(args) => commands::completions::run(args),
        Commands::Schema(args) => commands::schema::run(args),
    }
}
