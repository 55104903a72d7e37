//! CLI command definitions using clap
//!
//! Defines the command structure for the `repo-mirror` tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::release::ReleaseCoordinates;

/// repo-mirror - keep a local git working copy in sync with its remote
#[derive(Parser, Debug)]
#[command(name = "repo-mirror", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Settings that override the configuration file
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Configuration file (defaults to the per-user config.toml)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Remote repository URL
    #[arg(long, global = true, env = "REPO_MIRROR_URL")]
    pub url: Option<String>,

    /// Username for HTTP(S) remotes
    #[arg(long, global = true, env = "REPO_MIRROR_USERNAME")]
    pub username: Option<String>,

    /// Password or token for HTTP(S) remotes
    #[arg(long, global = true, env = "REPO_MIRROR_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Directory holding the local working copy
    #[arg(long, global = true, env = "REPO_MIRROR_LOCAL_PATH")]
    pub local_path: Option<PathBuf>,

    /// Tracked branch
    #[arg(long, global = true)]
    pub branch: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clone or update the local copy so it matches the remote
    Sync,

    /// Commit everything in the local copy and push it
    Publish(PublishArgs),

    /// Inspect configuration
    Config(ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Publish Command
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Commit message
    #[arg(long, short, required_unless_present = "release", conflicts_with = "release")]
    pub message: Option<String>,

    /// Released artifact as GROUP:ARTIFACT:VERSION
    #[arg(long, short)]
    pub release: Option<ReleaseCoordinates>,

    /// Publish even when release is disabled in the configuration
    #[arg(long)]
    pub force: bool,
}

impl PublishArgs {
    /// Commit message from --message or --release
    pub fn commit_message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.release.as_ref().map(ReleaseCoordinates::commit_message))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,
    /// Print the default configuration file path
    Path,
}
