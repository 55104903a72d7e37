//! Repository mirror
//!
//! Keeps one local working copy aligned with its remote:
//! - `sync` clones or opens the copy, then resets it to the remote tracking
//!   branch and fast-forwards to the remote's latest commit
//! - `publish` stages everything, commits and pushes
//!
//! Every phase either completes or fails with its own error; nothing is
//! retried. Callers must not point two mirrors at the same local path at the
//! same time.

use std::path::Path;

use git2::Oid;
use tracing::Dispatch;
use url::Url;

use crate::core::auth::AuthMode;
use crate::core::config::RepoConfig;
use crate::core::git::{LocalRepository, PullOutcome, REMOTE_NAME};
use crate::error::{MirrorError, Result};

/// A local working copy kept in sync with one remote branch
pub struct RepoMirror {
    config: RepoConfig,
    auth: AuthMode,
    dispatch: Dispatch,
    local: Option<LocalRepository>,
    branch: Option<String>,
}

impl RepoMirror {
    /// Validate `config` and log through the current default dispatcher
    pub fn new(config: RepoConfig) -> Result<Self> {
        let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());
        Self::with_dispatch(config, dispatch)
    }

    /// Validate `config` and log through `dispatch`
    pub fn with_dispatch(config: RepoConfig, dispatch: Dispatch) -> Result<Self> {
        let auth = config.validate()?;
        Ok(Self {
            config,
            auth,
            dispatch,
            local: None,
            branch: None,
        })
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn auth_mode(&self) -> &AuthMode {
        &self.auth
    }

    /// Path of the working copy
    pub fn local_path(&self) -> &Path {
        &self.config.local_path
    }

    /// Tracked branch, known once the local copy is open
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Make the local copy exist and match the remote's latest state.
    ///
    /// Returns the path to register as a package repository.
    pub fn sync(&mut self) -> Result<&Path> {
        let dispatch = self.dispatch.clone();
        tracing::dispatcher::with_default(&dispatch, || -> Result<()> {
            self.open_or_clone()?;
            self.reset_and_pull()?;
            Ok(())
        })?;
        Ok(self.local_path())
    }

    /// Clone the remote into the local path, or open the copy already there
    pub fn ensure_local(&mut self) -> Result<()> {
        let dispatch = self.dispatch.clone();
        tracing::dispatcher::with_default(&dispatch, || self.open_or_clone())
    }

    /// Reset the local branch to the remote tracking branch, then pull
    pub fn reconcile(&mut self) -> Result<PullOutcome> {
        let dispatch = self.dispatch.clone();
        tracing::dispatcher::with_default(&dispatch, || {
            self.open_or_clone()?;
            self.reset_and_pull()
        })
    }

    /// Stage all changes, commit them with `message` and push.
    ///
    /// Returns the pushed commit, or `None` when empty commits are disabled
    /// and nothing changed.
    pub fn publish(&mut self, message: &str) -> Result<Option<Oid>> {
        let dispatch = self.dispatch.clone();
        tracing::dispatcher::with_default(&dispatch, || {
            self.open_or_clone()?;
            self.stage_commit_push(message)
        })
    }

    fn open_or_clone(&mut self) -> Result<()> {
        if self.local.is_some() {
            return Ok(());
        }

        let path = self.config.local_path.clone();
        let url = self.config.url.trim();

        let local = if LocalRepository::exists_at(&path) {
            tracing::info!("Opening local copy at {}", path.display());
            let local = LocalRepository::open(&path).map_err(|source| MirrorError::OpenFailed {
                path: path.clone(),
                source,
            })?;
            check_origin(&local, url, &path)?;
            local
        } else {
            tracing::info!(
                "Cloning {} into {} ({})",
                redact_url(url),
                path.display(),
                self.auth.name()
            );
            let local = LocalRepository::clone(url, &path, &self.auth).map_err(|source| {
                MirrorError::CloneFailed {
                    url: redact_url(url),
                    path: path.clone(),
                    source,
                }
            })?;
            tracing::info!("Clone completed");
            local
        };

        let branch = match &self.config.branch {
            Some(branch) => branch.trim().to_string(),
            None => self
                .default_branch(&local)
                .map_err(|source| MirrorError::OpenFailed {
                    path: path.clone(),
                    source,
                })?,
        };
        tracing::debug!("Tracking branch {}/{}", REMOTE_NAME, branch);

        self.branch = Some(branch);
        self.local = Some(local);
        Ok(())
    }

    /// Branch to track when none is configured: the checked-out one, or for a
    /// copy of an empty remote the branch the remote's HEAD names
    fn default_branch(&self, local: &LocalRepository) -> std::result::Result<String, git2::Error> {
        if local.head_commit_id()?.is_some() {
            return local.current_branch();
        }

        match local.remote_default_branch(&self.auth)? {
            Some(branch) => Ok(branch),
            None => Err(git2::Error::from_str(
                "remote is empty and does not name a default branch; set branch in the configuration",
            )),
        }
    }

    fn reset_and_pull(&self) -> Result<PullOutcome> {
        let (local, branch) = self.opened()?;

        match local.reset_to_remote(branch).map_err(MirrorError::PullFailed)? {
            Some(oid) => tracing::info!("Reset {} to {}/{} at {}", branch, REMOTE_NAME, branch, oid),
            None => tracing::debug!("No {}/{} fetched yet; nothing to reset", REMOTE_NAME, branch),
        }

        tracing::info!("Pulling {} from {}", branch, redact_url(&self.config.url));
        local
            .fetch(branch, &self.auth)
            .map_err(MirrorError::PullFailed)?;
        let outcome = local.fast_forward(branch).map_err(MirrorError::PullFailed)?;

        match outcome {
            PullOutcome::UpToDate => tracing::info!("Local copy is up to date"),
            PullOutcome::FastForwarded(oid) => tracing::info!("Fast-forwarded {} to {}", branch, oid),
            PullOutcome::NoRemoteBranch => {
                let has_history = local.head_commit_id().map_err(MirrorError::PullFailed)?.is_some();
                if has_history {
                    return Err(MirrorError::PullFailed(git2::Error::from_str(&format!(
                        "remote has no branch '{}'",
                        branch
                    ))));
                }
                // First publish creates the branch on the remote
                local.attach_head(branch).map_err(MirrorError::PullFailed)?;
                tracing::warn!("Remote has no branch {}; local copy is empty", branch)
            }
        }

        Ok(outcome)
    }

    fn stage_commit_push(&self, message: &str) -> Result<Option<Oid>> {
        let (local, branch) = self.opened()?;

        tracing::info!("Pushing to remote repository {}", redact_url(&self.config.url));
        local.stage_all().map_err(MirrorError::CommitFailed)?;

        if !self.config.allow_empty_commit
            && !local.has_staged_changes().map_err(MirrorError::CommitFailed)?
        {
            tracing::info!("No changes to publish");
            return Ok(None);
        }

        let oid = local
            .commit(message, self.config.author.as_ref())
            .map_err(MirrorError::CommitFailed)?;
        tracing::debug!("Created commit {}", oid);

        local
            .push(branch, &self.auth)
            .map_err(MirrorError::PushFailed)?;
        tracing::info!("Push completed: {} on {}/{}", oid, REMOTE_NAME, branch);

        Ok(Some(oid))
    }

    fn opened(&self) -> Result<(&LocalRepository, &str)> {
        match (&self.local, &self.branch) {
            (Some(local), Some(branch)) => Ok((local, branch.as_str())),
            _ => Err(MirrorError::OpenFailed {
                path: self.config.local_path.clone(),
                source: git2::Error::from_str("local copy is not open"),
            }),
        }
    }
}

/// Fail unless the opened copy's origin is the configured remote
fn check_origin(local: &LocalRepository, expected: &str, path: &Path) -> Result<()> {
    let normalize = |url: &str| url.trim().trim_end_matches('/').to_string();

    match local.origin_url() {
        Some(found) if normalize(&found) == normalize(expected) => Ok(()),
        found => Err(MirrorError::RemoteMismatch {
            path: path.to_path_buf(),
            expected: redact_url(expected),
            found: found
                .map(|url| redact_url(&url))
                .unwrap_or_else(|| format!("no '{}' remote", REMOTE_NAME)),
        }),
    }
}

/// Hide a password embedded in a URL before it reaches logs or errors
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}
