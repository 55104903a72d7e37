//! Core functionality for repo-mirror
//!
//! This module contains the synchronization logic:
//! - Configuration loading and validation
//! - Transport authentication
//! - Local working copy operations
//! - The mirror itself (sync and publish)
//! - Release commit messages

pub mod auth;
pub mod config;
pub mod git;
pub mod mirror;
pub mod release;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::AuthMode;
pub use config::{Identity, RepoConfig};
pub use git::LocalRepository;
pub use mirror::RepoMirror;
pub use release::ReleaseCoordinates;
