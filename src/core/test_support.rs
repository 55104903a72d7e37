//! Fixtures for tests: bare remotes on disk and a capturing log sink

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use git2::{Oid, Repository, Signature};
use tracing::Dispatch;

use crate::core::config::Identity;

/// Identity used by tests that commit
pub fn tester() -> Identity {
    Identity {
        name: "Release Bot".into(),
        email: "release@example.com".into(),
    }
}

/// Create an empty bare repository whose default branch is `main`
pub fn init_remote(path: &Path) -> PathBuf {
    let repo = Repository::init_bare(path).unwrap();
    repo.set_head("refs/heads/main").unwrap();
    path.to_path_buf()
}

/// Commit `contents` as top-level file `name` directly on the remote's `main`
pub fn commit_to_remote(remote: &Path, name: &str, contents: &str, message: &str) -> Oid {
    let repo = Repository::open_bare(remote).unwrap();
    let parent = repo
        .refname_to_id("refs/heads/main")
        .ok()
        .map(|oid| repo.find_commit(oid).unwrap());

    let blob = repo.blob(contents.as_bytes()).unwrap();
    let base_tree = parent.as_ref().map(|c| c.tree().unwrap());
    let mut builder = repo.treebuilder(base_tree.as_ref()).unwrap();
    builder.insert(name, blob, 0o100644).unwrap();
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let signature = Signature::now("Remote", "remote@example.com").unwrap();
    let parents: Vec<_> = parent.iter().collect();
    repo.commit(
        Some("refs/heads/main"),
        &signature,
        &signature,
        message,
        &tree,
        &parents,
    )
    .unwrap()
}

/// Tip of the remote's `main` branch
pub fn remote_main(remote: &Path) -> Oid {
    Repository::open_bare(remote)
        .unwrap()
        .refname_to_id("refs/heads/main")
        .unwrap()
}

/// In-memory log buffer shared with a tracing subscriber
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A dispatcher that records every event at debug level and above
pub fn capture_logs() -> (Dispatch, CapturedLogs) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (Dispatch::new(subscriber), logs)
}
