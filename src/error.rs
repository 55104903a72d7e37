//! Custom error types for repo-mirror
//!
//! One variant per synchronization phase, each with a user-friendly message.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for repo-mirror
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Configuration rejected before any I/O
    #[error("Invalid repository configuration: {0}\n\n  → Expected an https://, ssh://, git@host:path or file:// URL.")]
    InvalidConfig(String),

    /// Cloning the remote into the local path failed
    #[error("Cannot clone '{url}' into {}: {source}\n\n  → Check the URL, your network connection and your credentials.", .path.display())]
    CloneFailed {
        url: String,
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    /// Local path holds git metadata that cannot be opened
    #[error("Cannot open the local copy at {}: {source}\n\n  → The repository metadata may be corrupt. Remove the directory to re-clone it.", .path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    /// Existing local copy points at a different remote
    #[error(
        "The local copy at {} tracks '{found}' but '{expected}' is configured.\n\n  \
        → Point local_path at another directory, or remove the existing copy.",
        .path.display()
    )]
    RemoteMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// Reset or pull against the remote failed
    #[error("Cannot update the local copy from the remote: {0}\n\n  → The local copy was reset to the last fetched remote state.")]
    PullFailed(#[source] git2::Error),

    /// Staging or committing failed
    #[error("Cannot commit local changes: {0}\n\n  → Set author in the configuration, or configure git user.name and user.email.")]
    CommitFailed(#[source] git2::Error),

    /// Pushing to the remote failed
    #[error("Cannot push to the remote: {0}\n\n  → The remote may have moved ahead. Run sync and publish again.")]
    PushFailed(#[source] git2::Error),

    /// Configuration file or directory error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML serialization/deserialization error
    #[error("Configuration file is invalid: {0}")]
    Toml(String),

    /// IO error
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for MirrorError {
    fn from(err: toml::de::Error) -> Self {
        MirrorError::Toml(err.to_string())
    }
}

/// Result type alias using MirrorError
pub type Result<T> = std::result::Result<T, MirrorError>;
