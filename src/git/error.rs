// ABOUTME: Error types for the git gateway.
// ABOUTME: Distinguishes transient network failures from repository corruption.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to launch git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git {command} failed (network): exit code {code}")]
    Transient {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("git {command} exited with code {code}")]
    Fatal {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("commits {0} and {1} have no common ancestor")]
    NoCommonAncestor(String, String),

    #[error("'{0}' exists but is not a git repository")]
    NotARepository(PathBuf),

    #[error("unexpected git output for {command}: {detail}")]
    Malformed { command: String, detail: String },
}

impl GitError {
    /// Transient errors abort the run without side effects; the next
    /// scheduled run retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, GitError::Transient { .. })
    }
}
