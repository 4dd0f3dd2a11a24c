// ABOUTME: The deployment run itself: prepare, select, activate, verify.
// ABOUTME: Generic over the git/activation/generation/probe seams for testing.

use super::DeployError;
use super::guard::SignalGuard;
use super::marker::SuccessMarker;
use super::plan::{self, NextStep};
use crate::config::{DeployMode, Settings};
use crate::generations::Generations;
use crate::git::Vcs;
use crate::hooks::{self, HookContext, HookRunner, HookStatus};
use crate::nixos::{Activate, ExitKind};
use crate::output::Output;
use crate::probe::Probe;
use crate::select::{self, DeployTarget, SelectorConfig};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Deploy even if the target commit is already active.
    pub force: bool,
    /// Probe the remote after runtime activation and roll back on failure.
    pub magic_rollback: bool,
}

#[derive(Debug)]
pub enum RunOutcome {
    UpToDate {
        ref_name: String,
    },
    Deployed {
        target: DeployTarget,
        effective_mode: DeployMode,
    },
}

#[derive(Debug)]
pub enum CheckOutcome {
    UpToDate { target: DeployTarget },
    Pending { target: DeployTarget },
}

/// One deployment run. Construction is cheap; all state lives on disk.
pub struct Deployer<'a, V, A, G, P> {
    settings: &'a Settings,
    hostname: &'a str,
    vcs: &'a V,
    activator: &'a A,
    generations: &'a G,
    probe: &'a P,
    output: &'a Output,
}

impl<'a, V, A, G, P> Deployer<'a, V, A, G, P>
where
    V: Vcs,
    A: Activate,
    G: Generations,
    P: Probe,
{
    pub fn new(
        settings: &'a Settings,
        hostname: &'a str,
        vcs: &'a V,
        activator: &'a A,
        generations: &'a G,
        probe: &'a P,
        output: &'a Output,
    ) -> Self {
        Self {
            settings,
            hostname,
            vcs,
            activator,
            generations,
            probe,
            output,
        }
    }

    fn selector_config(&self) -> SelectorConfig<'_> {
        SelectorConfig {
            hostname: self.hostname,
            main_branch: &self.settings.origin.main,
            testing_prefix: &self.settings.origin.testing_prefix,
            testing_separator: &self.settings.origin.testing_separator,
        }
    }

    /// Sync the mirror and pick the target commit. The success marker's
    /// commit is what counts as currently deployed.
    fn fetch_and_select(&self) -> Result<(DeployTarget, Option<SuccessMarker>), DeployError> {
        self.vcs.fetch()?;
        let marker = SuccessMarker::load(&self.settings.config_dir);
        let refs = self.vcs.remote_branches()?;
        let deployed = marker.as_ref().map(|m| m.commit.as_str());
        let target = select::select_target(self.vcs, &self.selector_config(), &refs, deployed)?;
        tracing::info!(
            "selected {} ({}) from {}",
            target.commit,
            target.branch_type,
            target.ref_name
        );
        Ok((target, marker))
    }

    /// The `check` subcommand: report whether an update is pending.
    pub fn check(&self) -> Result<CheckOutcome, DeployError> {
        let (target, marker) = self.fetch_and_select()?;
        let up_to_date = marker.as_ref().is_some_and(|m| m.commit == target.commit);
        Ok(if up_to_date {
            CheckOutcome::UpToDate { target }
        } else {
            CheckOutcome::Pending { target }
        })
    }

    pub fn run(&self, opts: &RunOptions) -> Result<RunOutcome, DeployError> {
        let (target, marker) = self.fetch_and_select()?;
        if !opts.force && marker.as_ref().is_some_and(|m| m.commit == target.commit) {
            return Ok(RunOutcome::UpToDate {
                ref_name: target.ref_name,
            });
        }

        let meta = self.vcs.commit_meta(&target.commit)?;
        let mode = self.settings.deploy_modes.for_branch_type(target.branch_type);
        self.output.progress(&format!(
            "Deploying {}, {} mode {}",
            target.ref_name, target.commit, mode
        ));

        if let Ok(Some(current)) = self.generations.current() {
            tracing::debug!("current generation: {}", current.number);
        }

        self.vcs.checkout_detached(&target.commit)?;

        let hooks = HookRunner::new(self.settings.hook.clone());
        let scheduled = hooks::scheduled_from_env();
        let hook_context = |status: HookStatus, mode: DeployMode| HookContext {
            status,
            branch_type: target.branch_type,
            mode,
            commit: &target.commit,
            commit_message: &meta.subject,
            last_success: marker.as_ref(),
            scheduled,
        };

        if let Some(result) = hooks.run(&hook_context(HookStatus::Pre, mode))
            && !result.success
        {
            return Err(DeployError::PreHookFailed {
                code: result.exit_code,
            });
        }

        // From here until verification/rollback has settled, the host
        // must not be left in an unknown state by an interrupt.
        let _guard = SignalGuard::block();

        let result = self.activator.activate(mode)?;
        let effective = result.effective_mode;

        match plan::after_activation(&result, opts.magic_rollback) {
            NextStep::Fail => {
                self.output.progress("Deployment failed");
                self.run_terminal_hook(&hooks, &hook_context(HookStatus::Failed, effective));
                Err(match result.exit_kind {
                    ExitKind::EvalFailed => DeployError::EvalFailed {
                        commit: target.commit.clone(),
                    },
                    _ => DeployError::BuildFailed {
                        commit: target.commit.clone(),
                    },
                })
            }
            NextStep::RollBack => {
                self.output.progress("Activation failed - rolling back");
                self.roll_back();
                self.run_terminal_hook(&hooks, &hook_context(HookStatus::Failed, effective));
                Err(DeployError::ActivationFailed {
                    commit: target.commit.clone(),
                })
            }
            NextStep::Verify => {
                let timeout = Duration::from_secs(self.settings.magic_rollback_timeout);
                if self.probe.reachable(timeout) {
                    self.succeed(&hooks, &hook_context, &target, &meta.subject, effective, false)
                } else {
                    self.output.progress("No network connection - rolling back");
                    self.roll_back();
                    self.run_terminal_hook(&hooks, &hook_context(HookStatus::Failed, effective));
                    Err(DeployError::Unreachable {
                        commit: target.commit.clone(),
                    })
                }
            }
            NextStep::Succeed { reboot } => {
                self.succeed(&hooks, &hook_context, &target, &meta.subject, effective, reboot)
            }
        }
    }

    fn succeed<'c>(
        &self,
        hooks: &HookRunner,
        hook_context: &impl Fn(HookStatus, DeployMode) -> HookContext<'c>,
        target: &DeployTarget,
        subject: &str,
        effective: DeployMode,
        reboot: bool,
    ) -> Result<RunOutcome, DeployError> {
        SuccessMarker::new(target.commit.clone(), subject.to_string())
            .store(&self.settings.config_dir)?;
        self.output
            .progress(&format!("Deployment succeeded: {effective}"));
        self.run_terminal_hook(hooks, &hook_context(HookStatus::Success, effective));

        if reboot {
            if let Err(e) = self.activator.schedule_reboot() {
                tracing::warn!("failed to schedule reboot: {e}");
            }
        }

        Ok(RunOutcome::Deployed {
            target: target.clone(),
            effective_mode: effective,
        })
    }

    /// Failures of success/failed hooks never change the run outcome.
    fn run_terminal_hook(&self, hooks: &HookRunner, context: &HookContext<'_>) {
        if let Some(result) = hooks.run(context)
            && !result.success
        {
            tracing::warn!(
                "{} hook failed with exit code {:?}",
                context.status.as_str(),
                result.exit_code
            );
        }
    }

    /// Best-effort revert to the previous generation. Its own failure is
    /// logged; the run keeps its original outcome.
    fn roll_back(&self) {
        match self.generations.previous() {
            Ok(Some(previous)) => {
                match self.generations.activate_generation(&previous, "switch") {
                    Ok(()) => self
                        .output
                        .progress(&format!("Rolled back to generation {}", previous.number)),
                    Err(e) => {
                        tracing::error!("rollback to generation {} failed: {e}", previous.number);
                    }
                }
            }
            Ok(None) => tracing::error!("no previous generation to roll back to"),
            Err(e) => tracing::error!("could not enumerate generations for rollback: {e}"),
        }
    }
}
