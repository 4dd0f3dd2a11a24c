// ABOUTME: The check subcommand: report whether an update is pending.
// ABOUTME: Never touches the system; requires an initialized state directory.

use nixpull::config::Settings;
use nixpull::deploy::{CheckOutcome, Deployer};
use nixpull::error::{Error, Result};
use nixpull::generations::ProfileRegistry;
use nixpull::nixos::NixosRebuild;
use nixpull::output::Output;
use nixpull::probe::LsRemoteProbe;

pub fn check(settings: Settings, output: &Output) -> Result<CheckOutcome> {
    if !settings.config_dir.is_dir() {
        return Err(Error::StateDirMissing(settings.config_dir.clone()));
    }

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
        output,
    );

    let outcome = deployer.check()?;
    match &outcome {
        CheckOutcome::UpToDate { target } => {
            output.success(&format!("Already on newest {} commit", target.ref_name));
        }
        CheckOutcome::Pending { target } => {
            output.success(&format!(
                "New commit available on {}: {}",
                target.ref_name, target.commit
            ));
        }
    }
    Ok(outcome)
}
