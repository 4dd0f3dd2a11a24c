// ABOUTME: Configuration types and parsing for the nixpull TOML file.
// ABOUTME: Handles deploy mode selection, token loading, and validation.

use crate::error::{Error, Result};
use crate::select::BranchType;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file when `--config` is absent.
pub const CONFIG_ENV: &str = "DEPLOY_CONFIG";

/// How a built configuration is made active on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployMode {
    /// Build and activate the runtime only; no bootloader change.
    Test,
    /// Build, activate, and make the bootloader default.
    Switch,
    /// Build and make the bootloader default; no runtime activation.
    Boot,
    /// Like `boot`, then schedule a reboot after hooks.
    Reboot,
    /// Build without activating, then `reboot` if the kernel or initrd
    /// changed against the running system, `switch` otherwise.
    RebootOnKernelChange,
}

impl DeployMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployMode::Test => "test",
            DeployMode::Switch => "switch",
            DeployMode::Boot => "boot",
            DeployMode::Reboot => "reboot",
            DeployMode::RebootOnKernelChange => "reboot_on_kernel_change",
        }
    }
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable settings for a single run, loaded from the TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// State directory: holds the repo mirror, lock file, and success marker.
    pub config_dir: PathBuf,

    pub origin: OriginConfig,

    /// Optional user script invoked at the pre/success/failed points.
    #[serde(default)]
    pub hook: Option<PathBuf>,

    #[serde(default)]
    pub deploy_modes: DeployModes,

    /// Wall-clock budget in seconds for the post-activation reachability probe.
    #[serde(default = "default_magic_rollback_timeout")]
    pub magic_rollback_timeout: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OriginConfig {
    /// Remote repository URL.
    pub url: String,

    /// Name of the production branch on the remote.
    pub main: String,

    /// Remote branches named `<prefix><host><sep><host>...` target specific hosts.
    pub testing_prefix: String,
    pub testing_separator: String,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployModes {
    #[serde(default = "default_main_mode")]
    pub main: DeployMode,

    #[serde(default = "default_testing_mode")]
    pub testing: DeployMode,
}

impl Default for DeployModes {
    fn default() -> Self {
        Self {
            main: default_main_mode(),
            testing: default_testing_mode(),
        }
    }
}

impl DeployModes {
    pub fn for_branch_type(&self, branch_type: BranchType) -> DeployMode {
        match branch_type {
            BranchType::Main => self.main,
            BranchType::Testing => self.testing,
        }
    }
}

fn default_main_mode() -> DeployMode {
    DeployMode::Switch
}

fn default_testing_mode() -> DeployMode {
    DeployMode::Test
}

fn default_magic_rollback_timeout() -> u64 {
    30
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.origin.token.is_some() && self.origin.token_file.is_some() {
            return Err(Error::InvalidConfig(
                "origin.token and origin.token_file are mutually exclusive".to_string(),
            ));
        }
        if self.magic_rollback_timeout == 0 {
            return Err(Error::InvalidConfig(
                "magic_rollback_timeout must be at least 1 second".to_string(),
            ));
        }
        if self.origin.testing_prefix.is_empty() {
            return Err(Error::InvalidConfig(
                "origin.testing_prefix must not be empty".to_string(),
            ));
        }
        if self.origin.testing_separator.is_empty() {
            return Err(Error::InvalidConfig(
                "origin.testing_separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the access token, reading the token file once if configured.
    /// Only the first line of the file is used.
    pub fn resolve_token(&self) -> Result<Option<String>> {
        if let Some(token) = &self.origin.token {
            return Ok(Some(token.clone()));
        }
        if let Some(path) = &self.origin.token_file {
            let content = fs::read_to_string(path)?;
            let token = content.lines().next().unwrap_or("").trim().to_string();
            if token.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "token file {} is empty",
                    path.display()
                )));
            }
            return Ok(Some(token));
        }
        Ok(None)
    }

    /// Local mirror of the remote repository.
    pub fn repo_dir(&self) -> PathBuf {
        self.config_dir.join("repo")
    }

    /// Advisory lock file guarding against concurrent runs.
    pub fn lock_path(&self) -> PathBuf {
        self.config_dir.join(".lock")
    }
}
