// ABOUTME: The run subcommand: deploy whatever the remote says this host runs.
// ABOUTME: Holds the advisory lock for the whole run.

use nixpull::config::Settings;
use nixpull::deploy::{DeployLock, Deployer, RunOptions, RunOutcome};
use nixpull::error::Result;
use nixpull::generations::ProfileRegistry;
use nixpull::nixos::NixosRebuild;
use nixpull::output::Output;
use nixpull::probe::LsRemoteProbe;
use std::fs;

pub fn run(
    settings: Settings,
    force: bool,
    no_magic_rollback: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    fs::create_dir_all(&settings.config_dir)?;
    let _lock = DeployLock::acquire(&settings.lock_path())?;

    let (vcs, auth) = super::open_repo(&settings)?;
    let hostname = super::hostname();
    let activator = NixosRebuild::new(settings.repo_dir(), hostname.clone());
    let generations = ProfileRegistry::default();
    let probe = LsRemoteProbe::new(settings.origin.url.clone(), auth);

    let deployer = Deployer::new(
        &settings,
        &hostname,
        &vcs,
        &activator,
        &generations,
        &probe,
        &output,
    );
    let opts = RunOptions {
        force,
        magic_rollback: !no_magic_rollback,
    };

    match deployer.run(&opts)? {
        RunOutcome::UpToDate { ref_name } => {
            output.progress(&format!("Already on newest {ref_name} commit"));
        }
        RunOutcome::Deployed {
            target,
            effective_mode,
        } => {
            output.success(&format!(
                "Deployed {} from {} ({effective_mode})",
                target.commit, target.ref_name
            ));
        }
    }
    Ok(())
}
