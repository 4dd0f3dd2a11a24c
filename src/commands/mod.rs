// ABOUTME: Command implementations shared between subcommands.
// ABOUTME: Builds the real git/activation/generation/probe collaborators.

mod check;
mod run;

pub use check::check;
pub use run::run;

use nixpull::config::Settings;
use nixpull::error::Result;
use nixpull::git::{GitAuth, GitCli};

/// Open (or clone) the local mirror configured in settings.
fn open_repo(settings: &Settings) -> Result<(GitCli, GitAuth)> {
    let auth = GitAuth::new(settings.resolve_token()?);
    let vcs = GitCli::ensure_repo(&settings.repo_dir(), &settings.origin.url, auth.clone())?;
    Ok((vcs, auth))
}

fn hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}
