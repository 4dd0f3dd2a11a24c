// ABOUTME: Target selection: decides which commit this host must run.
// ABOUTME: Pure decision logic over remote refs and ancestry queries.

use crate::git::{GitError, History, RemoteBranch};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("remote branch '{0}' does not exist")]
    MissingMainBranch(String),

    #[error(transparent)]
    Git(#[from] GitError),
}

/// Which line a target commit comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchType {
    Main,
    Testing,
}

impl BranchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchType::Main => "main",
            BranchType::Testing => "testing",
        }
    }
}

impl fmt::Display for BranchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The commit this host must run, and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub commit: String,
    pub branch_type: BranchType,
    pub ref_name: String,
}

/// Naming inputs of the selection algorithm.
pub struct SelectorConfig<'a> {
    pub hostname: &'a str,
    pub main_branch: &'a str,
    pub testing_prefix: &'a str,
    pub testing_separator: &'a str,
}

/// Pick the commit to deploy.
///
/// Testing branches name their target hosts
/// (`<prefix>host1<sep>host2...`); a candidate for this host wins over
/// main unless it has already landed on the main line, or it would move
/// the host strictly backwards relative to where the current deployment
/// branched off main. Among surviving candidates the latest committer
/// timestamp wins, with the branch name as a deterministic tie-break.
pub fn select_target<H: History + ?Sized>(
    history: &H,
    cfg: &SelectorConfig<'_>,
    refs: &[RemoteBranch],
    deployed: Option<&str>,
) -> Result<DeployTarget, SelectError> {
    let main = refs
        .iter()
        .find(|r| r.name == cfg.main_branch)
        .ok_or_else(|| SelectError::MissingMainBranch(cfg.main_branch.to_string()))?;

    // Anchor for downgrade prevention: where the current deployment
    // branched off the main line. Unknown on the first ever run, and
    // when the deployed commit shares no history with main.
    let base = match deployed {
        Some(deployed) => match history.merge_base(deployed, &main.tip) {
            Ok(base) => Some(base),
            Err(GitError::NoCommonAncestor(..)) => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    let mut candidates: Vec<&RemoteBranch> = Vec::new();
    for branch in refs {
        let Some(hosts) =
            parse_testing_hosts(&branch.name, cfg.testing_prefix, cfg.testing_separator)
        else {
            continue;
        };
        if !hosts.iter().any(|h| *h == cfg.hostname) {
            continue;
        }
        if history.is_merged_into(&branch.tip, &main.tip)? {
            tracing::debug!("skipping {}: already merged into {}", branch.name, main.name);
            continue;
        }
        if let Some(base) = &base
            && branch.tip != *base
            && history.is_ancestor(&branch.tip, base)?
        {
            tracing::debug!("skipping {}: strictly behind the deployed base", branch.name);
            continue;
        }
        candidates.push(branch);
    }

    candidates.sort_by(|a, b| {
        b.committed_at
            .cmp(&a.committed_at)
            .then_with(|| a.name.cmp(&b.name))
    });

    match candidates.first() {
        Some(branch) => Ok(DeployTarget {
            commit: branch.tip.clone(),
            branch_type: BranchType::Testing,
            ref_name: branch.name.clone(),
        }),
        None => Ok(DeployTarget {
            commit: main.tip.clone(),
            branch_type: BranchType::Main,
            ref_name: main.name.clone(),
        }),
    }
}

/// Parse a testing branch name into its hostname set. Returns None when
/// the name is not a testing branch for anyone.
fn parse_testing_hosts<'a>(name: &'a str, prefix: &str, separator: &str) -> Option<Vec<&'a str>> {
    let rest = name.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }
    let hosts: Vec<&str> = rest.split(separator).collect();
    if hosts.iter().any(|h| h.is_empty()) {
        return None;
    }
    Some(hosts)
}
