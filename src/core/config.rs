//! Repository configuration
//!
//! Handles loading the mirror settings from a TOML file and validating them
//! before any filesystem or network work starts:
//! - Remote URL and credentials
//! - Local path of the working copy
//! - SSH session options
//! - Commit identity and publishing behavior

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::core::auth::AuthMode;
use crate::error::{MirrorError, Result};

/// Author and committer identity used for published commits
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// Settings for one mirrored repository
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Remote repository URL (https://, ssh://, git@host:path or file://)
    pub url: String,

    /// Username for HTTP(S) remotes
    pub username: String,

    /// Password or token for HTTP(S) remotes
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,

    /// Where the working copy lives
    pub local_path: PathBuf,

    /// Whether the caller publishes releases back to the remote
    pub release: bool,

    /// SSH session options, OpenSSH style (`StrictHostKeyChecking = "no"`)
    pub ssh_options: BTreeMap<String, String>,

    /// Tracked branch; defaults to the branch the clone checked out
    pub branch: Option<String>,

    /// Commit identity; defaults to git's user.name / user.email
    pub author: Option<Identity>,

    /// Create a commit even when nothing changed
    pub allow_empty_commit: bool,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: SecretString::from(String::new()),
            local_path: default_local_path(),
            release: false,
            ssh_options: BTreeMap::new(),
            branch: None,
            author: None,
            allow_empty_commit: true,
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Default location of the working copy: `<data dir>/repo`
pub fn default_local_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.data_dir().join("repo"),
        None => PathBuf::from(".repo-mirror"),
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "repo-mirror", "repo-mirror")
}

impl RepoConfig {
    /// Configuration for `url` with every other setting at its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            MirrorError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: RepoConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default path, or defaults if it does not exist
    pub fn load_default() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(RepoConfig::default())
        }
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = project_dirs()
            .ok_or_else(|| MirrorError::Config("Could not determine config directory".into()))?;

        Ok(project_dirs.config_dir().join("config.toml"))
    }

    /// Check the configuration and resolve how remote operations authenticate.
    ///
    /// Performs no I/O. Credentials are not checked; the remote rejects bad
    /// ones when it is contacted.
    pub fn validate(&self) -> Result<AuthMode> {
        if self.url.trim().is_empty() {
            return Err(MirrorError::InvalidConfig("url must not be empty".into()));
        }
        if self.local_path.as_os_str().is_empty() {
            return Err(MirrorError::InvalidConfig(
                "local_path must not be empty".into(),
            ));
        }
        if let Some(branch) = &self.branch {
            if branch.trim().is_empty() {
                return Err(MirrorError::InvalidConfig(
                    "branch must not be blank when set".into(),
                ));
            }
        }

        AuthMode::from_config(self)
    }
}
