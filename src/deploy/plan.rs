// ABOUTME: Post-activation decision logic of the deployment state machine.
// ABOUTME: Pure function of the activation result and the rollback setting.

use crate::config::DeployMode;
use crate::nixos::{ActivationResult, ExitKind};

/// What the orchestrator does after the activation driver returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Probe the remote; roll back if it is unreachable.
    Verify,
    Succeed { reboot: bool },
    /// Activate the previous generation, then fail.
    RollBack,
    /// Nothing was activated; nothing to roll back.
    Fail,
}

/// Verification applies only to modes that changed the runtime (`test`,
/// `switch`, and the switch branch of `reboot_on_kernel_change`): for
/// `boot` nothing observable changed yet, and for `reboot` the reboot
/// itself is the commit point.
pub fn after_activation(result: &ActivationResult, magic_rollback: bool) -> NextStep {
    match result.exit_kind {
        ExitKind::EvalFailed | ExitKind::BuildFailed => NextStep::Fail,
        ExitKind::ActivateFailed => NextStep::RollBack,
        ExitKind::Ok => {
            let reboot = result.effective_mode == DeployMode::Reboot;
            match result.effective_mode {
                DeployMode::Test | DeployMode::Switch if magic_rollback => NextStep::Verify,
                _ => NextStep::Succeed { reboot },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn result(mode: DeployMode, exit_kind: ExitKind) -> ActivationResult {
        ActivationResult {
            built_toplevel: Some(PathBuf::from("/nix/store/xyz-toplevel")),
            effective_mode: mode,
            kernel_changed: mode == DeployMode::Reboot,
            exit_kind,
        }
    }

    #[test]
    fn switch_and_test_verify_when_rollback_is_enabled() {
        for mode in [DeployMode::Switch, DeployMode::Test] {
            let step = after_activation(&result(mode, ExitKind::Ok), true);
            assert_eq!(step, NextStep::Verify);
        }
    }

    #[test]
    fn disabled_rollback_skips_verification() {
        let step = after_activation(&result(DeployMode::Switch, ExitKind::Ok), false);
        assert_eq!(step, NextStep::Succeed { reboot: false });
    }

    #[test]
    fn boot_never_verifies() {
        let step = after_activation(&result(DeployMode::Boot, ExitKind::Ok), true);
        assert_eq!(step, NextStep::Succeed { reboot: false });
    }

    #[test]
    fn reboot_skips_verification_and_schedules_reboot() {
        let step = after_activation(&result(DeployMode::Reboot, ExitKind::Ok), true);
        assert_eq!(step, NextStep::Succeed { reboot: true });
    }

    #[test]
    fn build_failures_fail_without_rollback() {
        for kind in [ExitKind::EvalFailed, ExitKind::BuildFailed] {
            let step = after_activation(&result(DeployMode::Switch, kind), true);
            assert_eq!(step, NextStep::Fail);
        }
    }

    #[test]
    fn activation_failure_rolls_back() {
        let step = after_activation(&result(DeployMode::Switch, ExitKind::ActivateFailed), true);
        assert_eq!(step, NextStep::RollBack);
    }
}
