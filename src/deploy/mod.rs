// ABOUTME: Deployment orchestration: lock, state machine, and success marker.
// ABOUTME: Wires the git gateway, activation driver, generations, and hooks together.

mod error;
mod guard;
mod lock;
mod marker;
mod plan;
mod runner;

pub use error::DeployError;
pub use lock::{DeployLock, LockInfo};
pub use marker::{MARKER_FILENAME, SuccessMarker};
pub use plan::{NextStep, after_activation};
pub use runner::{CheckOutcome, Deployer, RunOptions, RunOutcome};
