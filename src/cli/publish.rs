//! Publish CLI command handler

use crate::cli::commands::PublishArgs;
use crate::core::config::RepoConfig;
use crate::core::mirror::RepoMirror;
use crate::error::{MirrorError, Result};

/// Handle the publish command.
///
/// The working copy is opened as it is, without a reset, so files written
/// into it since the last sync are what gets published.
pub fn handle_publish(config: RepoConfig, args: PublishArgs) -> Result<()> {
    if !config.release && !args.force {
        println!("Release publishing is disabled (release = false); nothing was pushed.");
        println!("  → Set release = true in the configuration, or pass --force.");
        return Ok(());
    }

    let message = args
        .commit_message()
        .ok_or_else(|| MirrorError::Config("A --message or --release is required".into()))?;

    let mut mirror = RepoMirror::new(config)?;
    mirror.ensure_local()?;

    println!("Publishing \"{}\"...", message);
    match mirror.publish(&message)? {
        Some(oid) => {
            let sha = oid.to_string();
            println!(
                "✓ Pushed {} to {}",
                &sha[..7.min(sha.len())],
                mirror.branch().unwrap_or("remote")
            );
        }
        None => println!("No changes to publish."),
    }

    Ok(())
}
