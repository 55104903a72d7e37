//! repo-mirror - git working copy synchronization
//!
//! `sync` makes the local copy match the remote; `publish` commits and pushes
//! whatever was written into it.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use repo_mirror::cli::commands::{Cli, Commands};
use repo_mirror::cli::{config, publish, resolve_config, sync};
use repo_mirror::error::Result;

fn main() {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync => sync::handle_sync(resolve_config(&cli.global)?),
        Commands::Publish(args) => publish::handle_publish(resolve_config(&cli.global)?, args),
        // Printing the config path must work even when the file is broken
        Commands::Config(args) => config::handle_config(args.command, resolve_config(&cli.global)),
    }
}
