// ABOUTME: Bounded-time reachability probe against the configured remote.
// ABOUTME: Lists remote refs with a hard wall-clock cap; no retries.

use crate::git::{GitAuth, base_command};
use std::io::Read;
use std::process::Stdio;
use std::time::Duration;
use wait_timeout::ChildExt;

/// A single yes/no network check. The probe gates magic rollback:
/// false means the remote was not reachable within the budget.
pub trait Probe {
    fn reachable(&self, timeout: Duration) -> bool;
}

/// Probes the remote by enumerating its refs with `git ls-remote`.
pub struct LsRemoteProbe {
    url: String,
    auth: GitAuth,
}

impl LsRemoteProbe {
    pub fn new(url: String, auth: GitAuth) -> Self {
        Self { url, auth }
    }
}

impl Probe for LsRemoteProbe {
    fn reachable(&self, timeout: Duration) -> bool {
        let mut cmd = base_command(None, &self.auth);
        cmd.arg("ls-remote")
            .arg("--heads")
            .arg(&self.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("reachability probe failed to launch git: {e}");
                return false;
            }
        };

        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                tracing::warn!(
                    "reachability probe timed out after {}s",
                    timeout.as_secs()
                );
                let _ = child.kill();
                let _ = child.wait();
                return false;
            }
            Err(e) => {
                tracing::warn!("reachability probe wait failed: {e}");
                let _ = child.kill();
                let _ = child.wait();
                return false;
            }
        };

        if !status.success() {
            return false;
        }

        // A reachable remote answers with at least one ref.
        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            let _ = out.read_to_string(&mut stdout);
        }
        !stdout.trim().is_empty()
    }
}
