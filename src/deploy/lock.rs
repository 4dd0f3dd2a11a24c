// ABOUTME: Deploy lock to prevent concurrent runs on the same host.
// ABOUTME: Advisory file lock with holder info for diagnostics.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::DeployError;

/// Information about who holds the deploy lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new() -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
        }
    }
}

impl Default for LockInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// A held deploy lock that releases on drop.
///
/// The kernel releases the advisory lock when the process exits, so a
/// crashed run never leaves a stale lock behind. The lock file itself is
/// kept in place; only its contents identify the holder.
#[derive(Debug)]
pub struct DeployLock {
    file: File,
}

impl DeployLock {
    /// Acquire the exclusive lock, without blocking.
    ///
    /// Returns `DeployError::Busy` (with the holder's info when readable)
    /// if another run holds the lock.
    pub fn acquire(path: &Path) -> Result<Self, DeployError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                let info = LockInfo::new();
                let json = serde_json::to_string(&info).map_err(io::Error::other)?;
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
                file.write_all(json.as_bytes())?;
                file.flush()?;
                Ok(Self { file })
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                let mut contents = String::new();
                let _ = file.read_to_string(&mut contents);
                let info = serde_json::from_str(&contents).ok();
                Err(DeployError::Busy { info })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
