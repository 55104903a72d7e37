//! Local working copy operations
//!
//! This module provides a wrapper around git2 for the operations a mirror
//! needs:
//! - Cloning and opening the working copy
//! - Hard reset to the remote tracking branch
//! - Fetch and fast-forward
//! - Staging, committing and pushing

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, Direction, ErrorCode, FetchOptions, IndexAddOption, Oid, PushOptions, Repository,
    ResetType, Signature,
};
use url::Url;

use crate::core::auth::AuthMode;
use crate::core::config::Identity;

/// The only remote a mirror works with
pub const REMOTE_NAME: &str = "origin";

/// Result of fast-forwarding the local branch to the fetched remote tip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Local branch already matches the remote
    UpToDate,
    /// Local branch moved forward to the given commit
    FastForwarded(Oid),
    /// Remote branch does not exist yet (empty remote)
    NoRemoteBranch,
}

/// Wrapper for the mirror's working copy
pub struct LocalRepository {
    repo: Repository,
}

impl LocalRepository {
    /// Check whether git metadata exists at `path`
    pub fn exists_at(path: &Path) -> bool {
        path.join(".git").exists()
    }

    /// Open the working copy at `path`
    pub fn open(path: &Path) -> Result<Self, git2::Error> {
        let repo = Repository::open(path)?;
        Ok(Self { repo })
    }

    /// Clone `url` into `path`, creating missing parent directories
    pub fn clone(url: &str, path: &Path, auth: &AuthMode) -> Result<Self, git2::Error> {
        fs::create_dir_all(path).map_err(|e| {
            git2::Error::from_str(&format!("cannot create {}: {}", path.display(), e))
        })?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(auth.remote_callbacks());

        let repo = RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(url, path)?;

        Ok(Self { repo })
    }

    /// Get the working directory
    pub fn root_dir(&self) -> PathBuf {
        self.repo
            .workdir()
            .unwrap_or_else(|| self.repo.path())
            .to_path_buf()
    }

    /// Get the URL of the origin remote, if there is one
    pub fn origin_url(&self) -> Option<String> {
        let remote = self.repo.find_remote(REMOTE_NAME).ok()?;
        remote.url().map(|s| s.to_string())
    }

    /// Get the branch HEAD points at, even when it has no commit yet
    pub fn current_branch(&self) -> Result<String, git2::Error> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().unwrap_or("HEAD").to_string()),
            Ok(_) => Err(git2::Error::from_str(
                "HEAD is detached; set branch in the configuration",
            )),
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                // Unborn HEAD still names its branch symbolically
                let head = self.repo.find_reference("HEAD")?;
                let target = head
                    .symbolic_target()
                    .ok_or_else(|| git2::Error::from_str("HEAD has no symbolic target"))?;
                Ok(target.strip_prefix("refs/heads/").unwrap_or(target).to_string())
            }
            Err(e) => Err(e),
        }
    }

    /// Point HEAD at `branch` without requiring it to have a commit yet
    pub fn attach_head(&self, branch: &str) -> Result<(), git2::Error> {
        self.repo.set_head(&format!("refs/heads/{}", branch))
    }

    /// Ask origin which branch its HEAD names.
    ///
    /// Returns `None` when the remote does not say, which is the case for an
    /// empty repository reached over most transports.
    pub fn remote_default_branch(&self, auth: &AuthMode) -> Result<Option<String>, git2::Error> {
        let head = match auth {
            AuthMode::Local => self.local_remote_head()?,
            _ => {
                let mut remote = self.repo.find_remote(REMOTE_NAME)?;
                let connection =
                    remote.connect_auth(Direction::Fetch, Some(auth.remote_callbacks()), None)?;
                match connection.default_branch() {
                    Ok(buf) => buf.as_str().map(|s| s.to_string()),
                    Err(e) if e.code() == ErrorCode::NotFound => None,
                    Err(e) => return Err(e),
                }
            }
        };

        Ok(head.map(|refname| {
            refname
                .strip_prefix("refs/heads/")
                .unwrap_or(&refname)
                .to_string()
        }))
    }

    // The local transport does not advertise an unborn HEAD, so read it directly
    fn local_remote_head(&self) -> Result<Option<String>, git2::Error> {
        let url = self
            .origin_url()
            .ok_or_else(|| git2::Error::from_str("no origin remote"))?;
        let path = match Url::parse(&url) {
            Ok(parsed) if parsed.scheme() == "file" => parsed
                .to_file_path()
                .map_err(|_| git2::Error::from_str(&format!("invalid file url '{}'", url)))?,
            _ => PathBuf::from(&url),
        };

        let remote = Repository::open(&path)?;
        let head = remote.find_reference("HEAD")?;
        Ok(head.symbolic_target().map(|s| s.to_string()))
    }

    /// Get the commit HEAD points at, `None` before the first commit
    pub fn head_commit_id(&self) -> Result<Option<Oid>, git2::Error> {
        match self.repo.head() {
            Ok(head) => Ok(head.target()),
            Err(e) if e.code() == ErrorCode::UnbornBranch => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get the message of the HEAD commit
    pub fn head_message(&self) -> Result<Option<String>, git2::Error> {
        match self.head_commit_id()? {
            Some(oid) => {
                let commit = self.repo.find_commit(oid)?;
                Ok(commit.message().map(|m| m.to_string()))
            }
            None => Ok(None),
        }
    }

    /// Get the last fetched tip of the remote tracking branch
    pub fn remote_tip(&self, branch: &str) -> Result<Option<Oid>, git2::Error> {
        let refname = format!("refs/remotes/{}/{}", REMOTE_NAME, branch);
        match self.repo.find_reference(&refname) {
            Ok(reference) => Ok(reference.target()),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Hard-reset `branch` to the remote tracking branch and check it out.
    ///
    /// Discards local commits and uncommitted changes to tracked files.
    /// Returns the commit reset to, or `None` when nothing has been fetched
    /// for the branch yet.
    pub fn reset_to_remote(&self, branch: &str) -> Result<Option<Oid>, git2::Error> {
        let Some(tip) = self.remote_tip(branch)? else {
            return Ok(None);
        };
        let commit = self.repo.find_commit(tip)?;

        if self.repo.find_branch(branch, BranchType::Local).is_err() {
            self.repo.branch(branch, &commit, false)?;
        }
        self.repo.set_head(&format!("refs/heads/{}", branch))?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo
            .reset(commit.as_object(), ResetType::Hard, Some(&mut checkout))?;

        Ok(Some(tip))
    }

    /// Fetch `branch` from origin into its remote tracking branch
    pub fn fetch(&self, branch: &str, auth: &AuthMode) -> Result<(), git2::Error> {
        let mut remote = self.repo.find_remote(REMOTE_NAME)?;
        let refspec = format!(
            "+refs/heads/{branch}:refs/remotes/{}/{branch}",
            REMOTE_NAME
        );

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(auth.remote_callbacks());

        remote.fetch(&[&refspec], Some(&mut fetch_options), None)?;
        Ok(())
    }

    /// Fast-forward `branch` to the fetched remote tip.
    ///
    /// Diverged history is an error; no merge is attempted.
    pub fn fast_forward(&self, branch: &str) -> Result<PullOutcome, git2::Error> {
        let Some(tip) = self.remote_tip(branch)? else {
            return Ok(PullOutcome::NoRemoteBranch);
        };
        let fetch_commit = self.repo.find_annotated_commit(tip)?;
        let (analysis, _) = self.repo.merge_analysis(&[&fetch_commit])?;

        let refname = format!("refs/heads/{}", branch);

        if analysis.is_up_to_date() {
            Ok(PullOutcome::UpToDate)
        } else if analysis.is_fast_forward() || analysis.is_unborn() {
            match self.repo.find_reference(&refname) {
                Ok(mut reference) => {
                    reference.set_target(tip, "repo-mirror: fast-forward")?;
                }
                Err(_) => {
                    self.repo
                        .reference(&refname, tip, true, "repo-mirror: fast-forward")?;
                }
            }
            self.repo.set_head(&refname)?;
            self.repo
                .checkout_head(Some(CheckoutBuilder::default().force()))?;
            Ok(PullOutcome::FastForwarded(tip))
        } else {
            Err(git2::Error::from_str(&format!(
                "local branch '{}' has diverged from {}/{}; refusing to merge",
                branch, REMOTE_NAME, branch
            )))
        }
    }

    /// Stage every change in the working tree: new, modified and deleted paths
    pub fn stage_all(&self) -> Result<(), git2::Error> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        // add_all does not notice removed files
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    /// Check whether the index differs from the HEAD commit's tree
    pub fn has_staged_changes(&self) -> Result<bool, git2::Error> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;

        match self.head_commit_id()? {
            Some(oid) => Ok(self.repo.find_commit(oid)?.tree_id() != tree_id),
            None => Ok(!index.is_empty()),
        }
    }

    /// Create a commit from the index, even when it matches HEAD
    pub fn commit(&self, message: &str, author: Option<&Identity>) -> Result<Oid, git2::Error> {
        let signature = match author {
            Some(identity) => Signature::now(&identity.name, &identity.email)?,
            None => self.repo.signature()?,
        };

        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let parent = match self.head_commit_id()? {
            Some(oid) => Some(self.repo.find_commit(oid)?),
            None => None, // First commit
        };
        let parents: Vec<_> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
    }

    /// Push `branch` to origin.
    ///
    /// A reference update rejected by the remote is an error even though the
    /// transport itself succeeded.
    pub fn push(&self, branch: &str, auth: &AuthMode) -> Result<(), git2::Error> {
        let mut remote = self.repo.find_remote(REMOTE_NAME)?;
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let rejection: RefCell<Option<String>> = RefCell::new(None);

        {
            let mut callbacks = auth.remote_callbacks();
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    *rejection.borrow_mut() = Some(format!("{} rejected: {}", refname, message));
                }
                Ok(())
            });

            let mut push_options = PushOptions::new();
            push_options.remote_callbacks(callbacks);
            remote.push(&[&refspec], Some(&mut push_options))?;
        }

        match rejection.into_inner() {
            Some(message) => Err(git2::Error::from_str(&message)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{commit_to_remote, init_remote, tester};
    use tempfile::TempDir;

    fn clone_fixture(temp_dir: &TempDir) -> (PathBuf, LocalRepository) {
        let remote = init_remote(&temp_dir.path().join("remote.git"));
        commit_to_remote(&remote, "artifact.txt", "v1", "Initial");
        let local = LocalRepository::clone(
            remote.to_str().unwrap(),
            &temp_dir.path().join("work"),
            &AuthMode::Local,
        )
        .unwrap();
        (remote, local)
    }

    #[test]
    fn test_exists_at() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!LocalRepository::exists_at(temp_dir.path()));

        Repository::init(temp_dir.path()).unwrap();
        assert!(LocalRepository::exists_at(temp_dir.path()));
    }

    #[test]
    fn test_clone_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let remote = init_remote(&temp_dir.path().join("remote.git"));
        commit_to_remote(&remote, "a.txt", "a", "Initial");

        let nested = temp_dir.path().join("parent").join("child").join("work");
        let local =
            LocalRepository::clone(remote.to_str().unwrap(), &nested, &AuthMode::Local).unwrap();

        assert!(nested.join(".git").exists());
        assert!(nested.join("a.txt").exists());
        assert_eq!(local.current_branch().unwrap(), "main");
        assert_eq!(local.origin_url().as_deref(), remote.to_str());
    }

    #[test]
    fn test_clone_missing_remote_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("does-not-exist.git");

        let result = LocalRepository::clone(
            missing.to_str().unwrap(),
            &temp_dir.path().join("work"),
            &AuthMode::Local,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_open_non_git_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(LocalRepository::open(temp_dir.path()).is_err());
    }

    #[test]
    fn test_current_branch_of_unborn_repository() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        repo.set_head("refs/heads/trunk").unwrap();

        let local = LocalRepository::open(temp_dir.path()).unwrap();
        assert_eq!(local.current_branch().unwrap(), "trunk");
        assert_eq!(local.head_commit_id().unwrap(), None);
    }

    #[test]
    fn test_reset_discards_local_commit_and_edits() {
        let temp_dir = TempDir::new().unwrap();
        let (_remote, local) = clone_fixture(&temp_dir);
        let root = local.root_dir();
        let remote_tip = local.remote_tip("main").unwrap().unwrap();

        fs::write(root.join("artifact.txt"), "local edit").unwrap();
        local.stage_all().unwrap();
        local.commit("orphan", Some(&tester())).unwrap();
        fs::write(root.join("artifact.txt"), "uncommitted").unwrap();

        assert_eq!(local.reset_to_remote("main").unwrap(), Some(remote_tip));
        assert_eq!(local.head_commit_id().unwrap(), Some(remote_tip));
        assert_eq!(fs::read_to_string(root.join("artifact.txt")).unwrap(), "v1");
    }

    #[test]
    fn test_reset_without_remote_branch_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let (_remote, local) = clone_fixture(&temp_dir);

        assert_eq!(local.reset_to_remote("release").unwrap(), None);
    }

    #[test]
    fn test_fetch_and_fast_forward() {
        let temp_dir = TempDir::new().unwrap();
        let (remote, local) = clone_fixture(&temp_dir);

        assert_eq!(local.fast_forward("main").unwrap(), PullOutcome::UpToDate);

        let new_tip = commit_to_remote(&remote, "artifact.txt", "v2", "Second");
        local.fetch("main", &AuthMode::Local).unwrap();

        assert_eq!(
            local.fast_forward("main").unwrap(),
            PullOutcome::FastForwarded(new_tip)
        );
        assert_eq!(
            fs::read_to_string(local.root_dir().join("artifact.txt")).unwrap(),
            "v2"
        );
    }

    #[test]
    fn test_fast_forward_refuses_diverged_history() {
        let temp_dir = TempDir::new().unwrap();
        let (remote, local) = clone_fixture(&temp_dir);

        fs::write(local.root_dir().join("local.txt"), "local").unwrap();
        local.stage_all().unwrap();
        local.commit("local only", Some(&tester())).unwrap();

        commit_to_remote(&remote, "remote.txt", "remote", "remote only");
        local.fetch("main", &AuthMode::Local).unwrap();

        let err = local.fast_forward("main").unwrap_err();
        assert!(err.message().contains("diverged"));
    }

    #[test]
    fn test_stage_all_includes_deletions() {
        let temp_dir = TempDir::new().unwrap();
        let (_remote, local) = clone_fixture(&temp_dir);
        let root = local.root_dir();

        assert!(!local.has_staged_changes().unwrap());

        fs::remove_file(root.join("artifact.txt")).unwrap();
        fs::create_dir_all(root.join("com/example")).unwrap();
        fs::write(root.join("com/example/lib.jar"), "jar").unwrap();
        local.stage_all().unwrap();
        assert!(local.has_staged_changes().unwrap());

        local.commit("Replace artifact", Some(&tester())).unwrap();
        let repo = Repository::open(&root).unwrap();
        let tree = repo.head().unwrap().peel_to_tree().unwrap();
        assert!(tree.get_name("artifact.txt").is_none());
        assert!(tree.get_path(Path::new("com/example/lib.jar")).is_ok());
    }

    #[test]
    fn test_commit_without_changes_creates_commit() {
        let temp_dir = TempDir::new().unwrap();
        let (_remote, local) = clone_fixture(&temp_dir);
        let before = local.head_commit_id().unwrap().unwrap();

        local.stage_all().unwrap();
        let oid = local.commit("Release g:a:1.0", Some(&tester())).unwrap();

        assert_ne!(oid, before);
        assert_eq!(local.head_message().unwrap().as_deref(), Some("Release g:a:1.0"));
    }

    #[test]
    fn test_push_updates_remote_branch() {
        let temp_dir = TempDir::new().unwrap();
        let (remote, local) = clone_fixture(&temp_dir);

        fs::write(local.root_dir().join("new.txt"), "new").unwrap();
        local.stage_all().unwrap();
        let oid = local.commit("Add new", Some(&tester())).unwrap();
        local.push("main", &AuthMode::Local).unwrap();

        let remote_repo = Repository::open_bare(&remote).unwrap();
        let tip = remote_repo.refname_to_id("refs/heads/main").unwrap();
        assert_eq!(tip, oid);
    }
}
