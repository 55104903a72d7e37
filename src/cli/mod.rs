//! CLI module for repo-mirror
//!
//! This module contains the CLI command definitions and handlers using clap.

pub mod commands;
pub mod config;
pub mod publish;
pub mod sync;

pub use commands::{Cli, Commands};

use secrecy::SecretString;

use crate::core::config::RepoConfig;
use crate::error::Result;
use commands::GlobalArgs;

/// Load the configuration file and apply command-line / environment overrides
pub fn resolve_config(args: &GlobalArgs) -> Result<RepoConfig> {
    let mut config = match &args.config {
        Some(path) => RepoConfig::load(path)?,
        None => RepoConfig::load_default()?,
    };

    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    if let Some(username) = &args.username {
        config.username = username.clone();
    }
    if let Some(password) = &args.password {
        config.password = SecretString::from(password.clone());
    }
    if let Some(local_path) = &args.local_path {
        config.local_path = local_path.clone();
    }
    if let Some(branch) = &args.branch {
        config.branch = Some(branch.clone());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_win_over_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "url = \"https://example.com/a.git\"\nusername = \"file-user\"\nrelease = true\n",
        )
        .unwrap();

        let args = GlobalArgs {
            config: Some(path),
            url: Some("https://example.com/b.git".into()),
            password: Some("token".into()),
            local_path: Some(PathBuf::from("/tmp/mirror")),
            ..GlobalArgs::default()
        };

        let config = resolve_config(&args).unwrap();
        assert_eq!(config.url, "https://example.com/b.git");
        assert_eq!(config.username, "file-user");
        assert_eq!(config.password.expose_secret(), "token");
        assert_eq!(config.local_path, PathBuf::from("/tmp/mirror"));
        assert!(config.release);
    }
}
