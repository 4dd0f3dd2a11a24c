// ABOUTME: Signal masking for the activation critical section.
// ABOUTME: Interrupts are held until verification or rollback has settled.

use nix::sys::signal::{SigSet, Signal};

/// Blocks SIGINT and SIGTERM for the current thread until dropped.
/// Signals received meanwhile stay pending and are delivered on drop.
pub struct SignalGuard {
    set: SigSet,
    blocked: bool,
}

impl SignalGuard {
    pub fn block() -> Self {
        let mut set = SigSet::empty();
        set.add(Signal::SIGINT);
        set.add(Signal::SIGTERM);
        let blocked = match set.thread_block() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to block signals: {e}");
                false
            }
        };
        Self { set, blocked }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        if self.blocked {
            if let Err(e) = self.set.thread_unblock() {
                tracing::warn!("failed to unblock signals: {e}");
            }
        }
    }
}
