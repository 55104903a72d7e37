//! Sync CLI command handler

use crate::core::config::RepoConfig;
use crate::core::mirror::RepoMirror;
use crate::error::Result;

/// Handle the sync command
pub fn handle_sync(config: RepoConfig) -> Result<()> {
    let mut mirror = RepoMirror::new(config)?;
    let path = mirror.sync()?;

    println!("✓ Local copy ready at {}", path.display());
    Ok(())
}
