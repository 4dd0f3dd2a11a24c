// ABOUTME: Error types for deployment runs.
// ABOUTME: Separates aborts from failures of the deployment itself.

use super::lock::LockInfo;
use crate::git::GitError;
use crate::nixos::ActivationError;
use crate::select::SelectError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    /// Another run holds the advisory lock.
    #[error("another deployment is already running")]
    Busy { info: Option<LockInfo> },

    #[error("pre hook failed with exit code {code:?}")]
    PreHookFailed { code: Option<i32> },

    /// The target commit does not evaluate; the system was not touched.
    #[error("evaluation of commit {commit} failed")]
    EvalFailed { commit: String },

    /// The target commit does not build; the system was not touched.
    #[error("build of commit {commit} failed")]
    BuildFailed { commit: String },

    /// Activation failed; a rollback was attempted.
    #[error("activation of commit {commit} failed")]
    ActivationFailed { commit: String },

    /// The reachability probe failed after activation; a rollback was
    /// attempted.
    #[error("remote unreachable after activating commit {commit}")]
    Unreachable { commit: String },

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    /// True for failures of the deployment itself (process exit code 1);
    /// everything else is an abort (exit code 2).
    pub fn is_deployment_failure(&self) -> bool {
        matches!(
            self,
            DeployError::EvalFailed { .. }
                | DeployError::BuildFailed { .. }
                | DeployError::ActivationFailed { .. }
                | DeployError::Unreachable { .. }
        )
    }

    /// Who holds the lock, when this is a Busy error with readable info.
    pub fn lock_holder_info(&self) -> Option<&LockInfo> {
        match self {
            DeployError::Busy { info } => info.as_ref(),
            _ => None,
        }
    }
}
