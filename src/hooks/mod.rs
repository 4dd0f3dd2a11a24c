// ABOUTME: Hook invocation for deployment lifecycle events.
// ABOUTME: Runs the optional user script with the documented DEPLOY_* environment.

use crate::config::DeployMode;
use crate::deploy::SuccessMarker;
use crate::select::BranchType;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;

/// Hook phases in the deployment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStatus {
    /// Before activation starts. Failure aborts the deployment.
    Pre,
    /// After a verified deployment. Failure logs a warning.
    Success,
    /// After a failed deployment. Failure logs a warning.
    Failed,
}

impl HookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookStatus::Pre => "pre",
            HookStatus::Success => "success",
            HookStatus::Failed => "failed",
        }
    }

    /// Whether a failure at this phase should abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookStatus::Pre)
    }
}

/// Context passed to the hook via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext<'a> {
    pub status: HookStatus,
    pub branch_type: BranchType,
    /// Effective mode where known; the pre hook sees the configured mode
    /// since kernel-change resolution has not happened yet.
    pub mode: DeployMode,
    pub commit: &'a str,
    pub commit_message: &'a str,
    pub last_success: Option<&'a SuccessMarker>,
    pub scheduled: bool,
}

impl HookContext<'_> {
    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("DEPLOY_STATUS".to_string(), self.status.as_str().to_string());
        env.insert(
            "DEPLOY_TYPE".to_string(),
            self.branch_type.as_str().to_string(),
        );
        env.insert("DEPLOY_MODE".to_string(), self.mode.to_string());
        env.insert("DEPLOY_COMMIT".to_string(), self.commit.to_string());
        env.insert(
            "DEPLOY_COMMIT_MESSAGE".to_string(),
            self.commit_message.to_string(),
        );
        env.insert(
            "DEPLOY_SUCCESS_COMMIT".to_string(),
            self.last_success
                .map(|m| m.commit.clone())
                .unwrap_or_default(),
        );
        env.insert(
            "DEPLOY_SUCCESS_COMMIT_MESSAGE".to_string(),
            self.last_success
                .map(|m| m.message.clone())
                .unwrap_or_default(),
        );
        env.insert(
            "DEPLOY_SCHEDULED".to_string(),
            if self.scheduled { "1" } else { "0" }.to_string(),
        );
        env
    }
}

/// True when this process was launched by a timer-driven service unit.
pub fn scheduled_from_env() -> bool {
    std::env::var_os("INVOCATION_ID").is_some()
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
}

/// Runs the configured hook executable, if any.
pub struct HookRunner {
    hook: Option<PathBuf>,
}

impl HookRunner {
    pub fn new(hook: Option<PathBuf>) -> Self {
        Self { hook }
    }

    /// Run the hook for the given phase, if one is configured.
    ///
    /// The hook inherits stdout/stderr so its output is visible in the
    /// service journal. Returns None when no hook is configured.
    pub fn run(&self, context: &HookContext<'_>) -> Option<HookResult> {
        let hook = self.hook.as_ref()?;
        let phase = context.status.as_str();
        tracing::info!("running {phase} hook: {}", hook.display());

        let status = Command::new(hook).envs(context.to_env()).status();
        match status {
            Ok(status) => {
                let result = HookResult {
                    success: status.success(),
                    exit_code: status.code(),
                };
                if !result.success {
                    tracing::warn!("{phase} hook exited with code {:?}", result.exit_code);
                }
                Some(result)
            }
            Err(e) => {
                tracing::error!("failed to execute {phase} hook: {e}");
                Some(HookResult {
                    success: false,
                    exit_code: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn context(status: HookStatus) -> HookContext<'static> {
        HookContext {
            status,
            branch_type: BranchType::Testing,
            mode: DeployMode::Test,
            commit: "abc123",
            commit_message: "add option",
            last_success: None,
            scheduled: false,
        }
    }

    #[test]
    fn status_names() {
        assert_eq!(HookStatus::Pre.as_str(), "pre");
        assert_eq!(HookStatus::Success.as_str(), "success");
        assert_eq!(HookStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn only_pre_is_fatal() {
        assert!(HookStatus::Pre.is_fatal());
        assert!(!HookStatus::Success.is_fatal());
        assert!(!HookStatus::Failed.is_fatal());
    }

    #[test]
    fn env_contains_the_full_contract() {
        let env = context(HookStatus::Pre).to_env();
        assert_eq!(env.get("DEPLOY_STATUS"), Some(&"pre".to_string()));
        assert_eq!(env.get("DEPLOY_TYPE"), Some(&"testing".to_string()));
        assert_eq!(env.get("DEPLOY_MODE"), Some(&"test".to_string()));
        assert_eq!(env.get("DEPLOY_COMMIT"), Some(&"abc123".to_string()));
        assert_eq!(
            env.get("DEPLOY_COMMIT_MESSAGE"),
            Some(&"add option".to_string())
        );
        assert_eq!(env.get("DEPLOY_SUCCESS_COMMIT"), Some(&String::new()));
        assert_eq!(
            env.get("DEPLOY_SUCCESS_COMMIT_MESSAGE"),
            Some(&String::new())
        );
        assert_eq!(env.get("DEPLOY_SCHEDULED"), Some(&"0".to_string()));
    }

    #[test]
    fn env_carries_the_success_marker() {
        let marker = SuccessMarker {
            commit: "def456".to_string(),
            message: "previous deploy".to_string(),
            timestamp: Utc::now(),
        };
        let mut ctx = context(HookStatus::Success);
        ctx.last_success = Some(&marker);
        ctx.scheduled = true;

        let env = ctx.to_env();
        assert_eq!(env.get("DEPLOY_SUCCESS_COMMIT"), Some(&"def456".to_string()));
        assert_eq!(
            env.get("DEPLOY_SUCCESS_COMMIT_MESSAGE"),
            Some(&"previous deploy".to_string())
        );
        assert_eq!(env.get("DEPLOY_SCHEDULED"), Some(&"1".to_string()));
    }

    #[test]
    fn absent_hook_runs_nothing() {
        let runner = HookRunner::new(None);
        assert!(runner.run(&context(HookStatus::Pre)).is_none());
    }
}
