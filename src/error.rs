// ABOUTME: Application-wide error types for nixpull.
// ABOUTME: Uses thiserror for ergonomic error handling.

use crate::deploy::DeployError;
use crate::git::GitError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("no configuration file given (use --config or set $DEPLOY_CONFIG)")]
    NoConfig,

    #[error("state directory does not exist: {0}")]
    StateDirMissing(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Deploy(#[from] DeployError),
}

impl Error {
    /// Process exit code for this error: 1 for a failed deployment,
    /// 2 for aborts, lock contention, and configuration problems.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Deploy(e) if e.is_deployment_failure() => 1,
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
