// ABOUTME: Success marker recording the last verified deployment.
// ABOUTME: Written atomically via temp-file-then-rename inside config_dir.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const MARKER_FILENAME: &str = "last_success.json";

/// On-disk record of the last deployment that completed activation and
/// passed the reachability probe. Its commit is also what the selector
/// treats as currently deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessMarker {
    pub commit: String,
    /// Subject line of the deployed commit.
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl SuccessMarker {
    pub fn new(commit: String, message: String) -> Self {
        Self {
            commit,
            message,
            timestamp: Utc::now(),
        }
    }

    /// Read the marker from `config_dir`. A missing or unreadable marker
    /// yields None; a run then behaves like a first deployment.
    pub fn load(config_dir: &Path) -> Option<Self> {
        let path = config_dir.join(MARKER_FILENAME);
        let contents = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(marker) => Some(marker),
            Err(e) => {
                tracing::warn!("ignoring corrupt success marker {}: {e}", path.display());
                None
            }
        }
    }

    /// Persist the marker. The temp file lives in `config_dir` so the
    /// final rename never crosses filesystems and is atomic.
    pub fn store(&self, config_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        let mut tmp = NamedTempFile::new_in(config_dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(config_dir.join(MARKER_FILENAME))
            .map_err(|e| e.error)?;
        Ok(())
    }
}
