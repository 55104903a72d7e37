//! repo-mirror - keep a local git working copy in sync with its remote
//!
//! On every run the local copy is cloned or opened, reset to the remote
//! tracking branch and fast-forwarded. Releases are published back by
//! staging everything, committing and pushing.

pub mod cli;
pub mod core;
pub mod error;

pub use crate::core::{RepoConfig, RepoMirror};
pub use error::{MirrorError, Result};
