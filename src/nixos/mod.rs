// ABOUTME: Activation driver around nixos-rebuild.
// ABOUTME: Classifies build/activation outcomes and detects kernel changes.

use crate::config::DeployMode;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("failed to launch {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome class of one activation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Ok,
    /// The target commit does not evaluate; nothing was built.
    EvalFailed,
    /// Evaluation succeeded but the build failed; nothing was activated.
    BuildFailed,
    /// The build succeeded but activation failed; the system may be
    /// partially changed, the previous generation remains selectable.
    ActivateFailed,
}

#[derive(Debug, Clone)]
pub struct ActivationResult {
    pub built_toplevel: Option<PathBuf>,
    /// The mode actually executed, after `reboot_on_kernel_change`
    /// resolution. One of test/switch/boot/reboot.
    pub effective_mode: DeployMode,
    pub kernel_changed: bool,
    pub exit_kind: ExitKind,
}

impl ActivationResult {
    pub fn is_ok(&self) -> bool {
        self.exit_kind == ExitKind::Ok
    }
}

/// Seam for the orchestrator; implemented by [`NixosRebuild`].
pub trait Activate {
    fn activate(&self, mode: DeployMode) -> Result<ActivationResult, ActivationError>;

    /// Schedule a host reboot shortly after the current run finishes.
    fn schedule_reboot(&self) -> Result<(), ActivationError>;
}

struct CommandOutput {
    success: bool,
    code: i32,
    stdout: String,
    stderr: String,
}

/// Drives the nixos-rebuild tool against the checked-out flake.
pub struct NixosRebuild {
    flake_dir: PathBuf,
    host: String,
    booted_system: PathBuf,
}

impl NixosRebuild {
    pub fn new(flake_dir: PathBuf, host: String) -> Self {
        Self {
            flake_dir,
            host,
            booted_system: PathBuf::from("/run/booted-system"),
        }
    }

    fn flake_attr(&self) -> String {
        format!("{}#{}", self.flake_dir.display(), self.host)
    }

    fn rebuild(&self, subcommand: &str) -> Result<CommandOutput, ActivationError> {
        let attr = self.flake_attr();
        tracing::info!("nixos-rebuild {subcommand} --flake {attr}");
        let output = Command::new("nixos-rebuild")
            .arg(subcommand)
            .arg("--flake")
            .arg(&attr)
            .output()
            .map_err(|e| ActivationError::Spawn {
                command: format!("nixos-rebuild {subcommand}"),
                source: e,
            })?;

        let result = CommandOutput {
            success: output.status.success(),
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        if !result.success {
            tracing::error!(
                "nixos-rebuild {subcommand} exited with code {}:\n{}",
                result.code,
                tail(&result.stderr, 20)
            );
        }
        Ok(result)
    }

    /// Build the system without activating. Returns the toplevel store path,
    /// or the failure class when the commit cannot be built.
    fn build(&self) -> Result<std::result::Result<PathBuf, ExitKind>, ActivationError> {
        let output = self.rebuild("build")?;
        if !output.success {
            return Ok(Err(classify_build_failure(&output.stderr)));
        }
        let toplevel = output
            .stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| line.starts_with("/nix/store/"));
        match toplevel {
            Some(path) => Ok(Ok(PathBuf::from(path))),
            None => {
                tracing::error!("nixos-rebuild build produced no store path");
                Ok(Err(ExitKind::BuildFailed))
            }
        }
    }
}

impl Activate for NixosRebuild {
    fn activate(&self, mode: DeployMode) -> Result<ActivationResult, ActivationError> {
        // Build first so eval/build failures precede any mutation.
        let toplevel = match self.build()? {
            Ok(path) => path,
            Err(kind) => {
                return Ok(ActivationResult {
                    built_toplevel: None,
                    effective_mode: mode,
                    kernel_changed: false,
                    exit_kind: kind,
                });
            }
        };

        let (effective, kernel_changed) = match mode {
            DeployMode::RebootOnKernelChange => {
                let changed = kernel_or_initrd_changed(&self.booted_system, &toplevel);
                if changed {
                    tracing::info!("kernel or initrd changed, deploying as reboot");
                    (DeployMode::Reboot, true)
                } else {
                    (DeployMode::Switch, false)
                }
            }
            other => (other, false),
        };

        let subcommand = match effective {
            DeployMode::Test => "test",
            DeployMode::Switch => "switch",
            DeployMode::Boot | DeployMode::Reboot => "boot",
            DeployMode::RebootOnKernelChange => unreachable!("resolved above"),
        };
        let output = self.rebuild(subcommand)?;
        let exit_kind = if output.success {
            ExitKind::Ok
        } else {
            ExitKind::ActivateFailed
        };

        Ok(ActivationResult {
            built_toplevel: Some(toplevel),
            effective_mode: effective,
            kernel_changed,
            exit_kind,
        })
    }

    fn schedule_reboot(&self) -> Result<(), ActivationError> {
        tracing::info!("rebooting in 1 minute");
        let status = Command::new("systemctl")
            .args(["reboot", "--when=+1min"])
            .status()
            .map_err(|e| ActivationError::Spawn {
                command: "systemctl reboot".to_string(),
                source: e,
            })?;
        if !status.success() {
            tracing::warn!("systemctl reboot exited with code {:?}", status.code());
        }
        Ok(())
    }
}

/// Compare the kernel and initrd symlinks of the running system against a
/// built toplevel. Missing or unreadable entries count as changed.
pub fn kernel_or_initrd_changed(booted: &Path, built: &Path) -> bool {
    ["kernel", "initrd"].iter().any(|name| {
        match (fs::read_link(booted.join(name)), fs::read_link(built.join(name))) {
            (Ok(old), Ok(new)) => old != new,
            _ => true,
        }
    })
}

/// Distinguish an evaluation failure from a build failure by the error
/// markers nix prints before any derivation is realized.
fn classify_build_failure(stderr: &str) -> ExitKind {
    const EVAL_MARKERS: &[&str] = &[
        "evaluation aborted",
        "error: undefined variable",
        "error: attribute",
        "error: syntax error",
        "error: infinite recursion",
        "does not provide attribute",
    ];
    if EVAL_MARKERS.iter().any(|marker| stderr.contains(marker)) {
        ExitKind::EvalFailed
    } else {
        ExitKind::BuildFailed
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
