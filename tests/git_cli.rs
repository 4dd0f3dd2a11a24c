// ABOUTME: Integration tests for the git gateway against real repositories.
// ABOUTME: Exercises clone, fetch with pruning, ref listing, and ancestry queries.

use nixpull::git::{GitAuth, GitCli, GitError, History, Vcs};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Run git with a pinned identity, panicking on failure.
fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_CONFIG_GLOBAL", "")
        .env("GIT_CONFIG_SYSTEM", "")
        .env("GIT_AUTHOR_NAME", "test user")
        .env("GIT_AUTHOR_EMAIL", "test@localhost")
        .env("GIT_COMMITTER_NAME", "test user")
        .env("GIT_COMMITTER_EMAIL", "test@localhost")
        .output()
        .expect("git should be installed");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create an origin repository with one commit on main.
fn origin_repo(tmp: &TempDir) -> PathBuf {
    let origin = tmp.path().join("origin");
    std::fs::create_dir(&origin).unwrap();
    git(&origin, &["init", "-b", "main"]);
    git(&origin, &["commit", "--allow-empty", "-m", "initial commit"]);
    origin
}

fn open(tmp: &TempDir, origin: &Path) -> GitCli {
    let repo = tmp.path().join("repo");
    GitCli::ensure_repo(&repo, origin.to_str().unwrap(), GitAuth::default()).unwrap()
}

#[test]
fn ensure_repo_clones_and_reopens() {
    let tmp = TempDir::new().unwrap();
    let origin = origin_repo(&tmp);
    let repo = tmp.path().join("repo");

    let first = GitCli::ensure_repo(&repo, origin.to_str().unwrap(), GitAuth::default());
    assert!(first.is_ok());
    assert!(repo.join(".git").exists());

    // Reopening an existing mirror must not fail.
    let second = GitCli::ensure_repo(&repo, origin.to_str().unwrap(), GitAuth::default());
    assert!(second.is_ok());
}

#[test]
fn ensure_repo_reconciles_a_changed_origin_url() {
    let tmp = TempDir::new().unwrap();
    let origin = origin_repo(&tmp);
    let repo = tmp.path().join("repo");
    GitCli::ensure_repo(&repo, origin.to_str().unwrap(), GitAuth::default()).unwrap();

    let moved = tmp.path().join("origin-moved");
    std::fs::rename(&origin, &moved).unwrap();
    GitCli::ensure_repo(&repo, moved.to_str().unwrap(), GitAuth::default()).unwrap();

    assert_eq!(
        git(&repo, &["remote", "get-url", "origin"]),
        moved.to_str().unwrap()
    );
}

#[test]
fn ensure_repo_rejects_a_non_repository() {
    let tmp = TempDir::new().unwrap();
    let not_repo = tmp.path().join("repo");
    std::fs::create_dir(&not_repo).unwrap();
    std::fs::write(not_repo.join("file"), "data").unwrap();

    match GitCli::ensure_repo(&not_repo, "https://example.com/r.git", GitAuth::default()) {
        Err(GitError::NotARepository(path)) => assert_eq!(path, not_repo),
        Err(other) => panic!("expected NotARepository, got {other:?}"),
        Ok(_) => panic!("expected NotARepository, got a repository"),
    }
}

#[test]
fn clone_failure_is_transient() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    let missing = tmp.path().join("no-such-origin");

    match GitCli::ensure_repo(&repo, missing.to_str().unwrap(), GitAuth::default()) {
        Err(e) => assert!(e.is_transient(), "clone failure should be transient: {e}"),
        Ok(_) => panic!("clone from a missing origin should fail"),
    }
}

#[test]
fn remote_branches_lists_tips() {
    let tmp = TempDir::new().unwrap();
    let origin = origin_repo(&tmp);
    git(&origin, &["branch", "testing-alpha"]);
    let main_tip = git(&origin, &["rev-parse", "main"]);

    let vcs = open(&tmp, &origin);
    vcs.fetch().unwrap();

    let branches = vcs.remote_branches().unwrap();
    let names: Vec<&str> = branches.iter().map(|b| b.name.as_str()).collect();
    assert!(names.contains(&"main"));
    assert!(names.contains(&"testing-alpha"));
    assert!(!names.contains(&"HEAD"));

    let main = branches.iter().find(|b| b.name == "main").unwrap();
    assert_eq!(main.tip, main_tip);
    assert!(main.committed_at.timestamp() > 0);
}

#[test]
fn fetch_prunes_deleted_branches() {
    let tmp = TempDir::new().unwrap();
    let origin = origin_repo(&tmp);
    git(&origin, &["branch", "short-lived"]);

    let vcs = open(&tmp, &origin);
    vcs.fetch().unwrap();
    assert!(
        vcs.remote_branches()
            .unwrap()
            .iter()
            .any(|b| b.name == "short-lived")
    );

    git(&origin, &["branch", "-D", "short-lived"]);
    vcs.fetch().unwrap();
    assert!(
        !vcs.remote_branches()
            .unwrap()
            .iter()
            .any(|b| b.name == "short-lived")
    );
}

#[test]
fn ancestry_queries_follow_history() {
    let tmp = TempDir::new().unwrap();
    let origin = origin_repo(&tmp);
    let first = git(&origin, &["rev-parse", "main"]);
    git(&origin, &["commit", "--allow-empty", "-m", "second commit"]);
    let second = git(&origin, &["rev-parse", "main"]);

    let vcs = open(&tmp, &origin);
    vcs.fetch().unwrap();

    assert_eq!(vcs.merge_base(&first, &second).unwrap(), first);
    assert!(vcs.is_ancestor(&first, &second).unwrap());
    assert!(!vcs.is_ancestor(&second, &first).unwrap());
    assert!(vcs.is_merged_into(&first, &second).unwrap());
    assert!(!vcs.is_merged_into(&second, &first).unwrap());
}

#[test]
fn disjoint_histories_have_no_common_ancestor() {
    let tmp = TempDir::new().unwrap();
    let origin = origin_repo(&tmp);
    let main_tip = git(&origin, &["rev-parse", "main"]);
    git(&origin, &["checkout", "--orphan", "lonely"]);
    git(&origin, &["commit", "--allow-empty", "-m", "unrelated root"]);
    let lonely_tip = git(&origin, &["rev-parse", "lonely"]);
    git(&origin, &["checkout", "main"]);

    let vcs = open(&tmp, &origin);
    vcs.fetch().unwrap();

    match vcs.merge_base(&lonely_tip, &main_tip) {
        Err(GitError::NoCommonAncestor(..)) => {}
        other => panic!("expected NoCommonAncestor, got {other:?}"),
    }
    // A disjoint branch is simply not merged.
    assert!(!vcs.is_merged_into(&lonely_tip, &main_tip).unwrap());
}

#[test]
fn commit_meta_reads_subject_and_author() {
    let tmp = TempDir::new().unwrap();
    let origin = origin_repo(&tmp);
    git(&origin, &["commit", "--allow-empty", "-m", "enable zram swap"]);
    let tip = git(&origin, &["rev-parse", "main"]);

    let vcs = open(&tmp, &origin);
    vcs.fetch().unwrap();

    let meta = vcs.commit_meta(&tip).unwrap();
    assert_eq!(meta.hash, tip);
    assert_eq!(meta.author, "test user");
    assert_eq!(meta.subject, "enable zram swap");
}

#[test]
fn checkout_detached_moves_head() {
    let tmp = TempDir::new().unwrap();
    let origin = origin_repo(&tmp);
    let first = git(&origin, &["rev-parse", "main"]);
    git(&origin, &["commit", "--allow-empty", "-m", "second commit"]);

    let vcs = open(&tmp, &origin);
    vcs.fetch().unwrap();
    vcs.checkout_detached(&first).unwrap();

    let repo = tmp.path().join("repo");
    assert_eq!(git(&repo, &["rev-parse", "HEAD"]), first);
}
