// ABOUTME: Registry of previously built system generations.
// ABOUTME: Enumerates the OS profile directory and activates prior generations.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to enumerate system profiles in {dir}: {source}")]
    Enumerate {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch switch-to-configuration: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("switch-to-configuration exited with code {0}")]
    SwitchFailed(i32),
}

/// One installed, bootable configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub number: u64,
    /// Profile link resolving into the store, e.g. `system-42-link`.
    pub path: PathBuf,
}

/// Seam for the orchestrator; implemented by [`ProfileRegistry`].
pub trait Generations {
    fn current(&self) -> Result<Option<Generation>, GenerationError>;

    fn previous(&self) -> Result<Option<Generation>, GenerationError>;

    /// Activate an arbitrary prior generation. Rollback is
    /// `activate_generation(previous(), "switch")`.
    fn activate_generation(&self, generation: &Generation, mode: &str)
    -> Result<(), GenerationError>;
}

/// Discovers generations from the system profile directory.
pub struct ProfileRegistry {
    profiles_dir: PathBuf,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new(PathBuf::from("/nix/var/nix/profiles"))
    }
}

impl ProfileRegistry {
    pub fn new(profiles_dir: PathBuf) -> Self {
        Self { profiles_dir }
    }

    /// All generations, ordered by generation number.
    fn list(&self) -> Result<Vec<Generation>, GenerationError> {
        let entries = fs::read_dir(&self.profiles_dir).map_err(|e| GenerationError::Enumerate {
            dir: self.profiles_dir.clone(),
            source: e,
        })?;

        let mut generations = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            if let Some(number) = parse_profile_link(&name.to_string_lossy()) {
                generations.push(Generation {
                    number,
                    path: entry.path(),
                });
            }
        }
        generations.sort_by_key(|g| g.number);
        Ok(generations)
    }

    fn current_number(&self) -> Option<u64> {
        let target = fs::read_link(self.profiles_dir.join("system")).ok()?;
        parse_profile_link(&target.file_name()?.to_string_lossy())
    }
}

impl Generations for ProfileRegistry {
    fn current(&self) -> Result<Option<Generation>, GenerationError> {
        let Some(number) = self.current_number() else {
            return Ok(None);
        };
        Ok(self.list()?.into_iter().find(|g| g.number == number))
    }

    fn previous(&self) -> Result<Option<Generation>, GenerationError> {
        let Some(current) = self.current_number() else {
            return Ok(None);
        };
        Ok(self
            .list()?
            .into_iter()
            .filter(|g| g.number < current)
            .next_back())
    }

    fn activate_generation(
        &self,
        generation: &Generation,
        mode: &str,
    ) -> Result<(), GenerationError> {
        tracing::info!(
            "activating generation {} with '{mode}'",
            generation.number
        );
        let status = Command::new(generation.path.join("bin/switch-to-configuration"))
            .arg(mode)
            .status()
            .map_err(GenerationError::Spawn)?;
        if !status.success() {
            return Err(GenerationError::SwitchFailed(status.code().unwrap_or(-1)));
        }
        Ok(())
    }
}

/// Parse `system-<N>-link` into the generation number.
fn parse_profile_link(name: &str) -> Option<u64> {
    name.strip_prefix("system-")?
        .strip_suffix("-link")?
        .parse()
        .ok()
}
