//! Best-effort, timeout-bounded git HEAD probe used to populate the
//! manifest's `git_head` field. Never blocks the caller past the timeout and
//! never propagates an error — an unavailable or non-git directory simply
//! yields an empty string, per SPEC_FULL.md §5.

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolve the repository's current HEAD commit as a 40-char hex string, or
/// `""` if the directory isn't a git repo, has no commits yet, or the probe
/// doesn't finish within the timeout.
pub fn head_with_timeout(repo_root: &Path) -> String {
    let root = repo_root.to_path_buf();
    let (tx, rx) = mpsc::channel();

    let handle = std::thread::spawn(move || {
        let result = probe(&root);
        // The receiver may already have timed out and dropped; ignore.
        let _ = tx.send(result);
    });

    let head = rx.recv_timeout(PROBE_TIMEOUT).unwrap_or_default();
    // Don't join: a wedged git2 call (e.g. on a network filesystem) must not
    // hold up the caller. The thread is left to finish or die on its own.
    drop(handle);
    head
}

fn probe(repo_root: &Path) -> String {
    let repo = match git2::Repository::open(repo_root) {
        Ok(r) => r,
        Err(_) => return String::new(),
    };
    match repo.head().and_then(|h| h.peel_to_commit()) {
        Ok(commit) => commit.id().to_string(),
        Err(_) => String::new(),
    }
}
