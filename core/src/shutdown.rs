use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation flag for one running session (§5 "Cancellation
/// & timeouts"). Cheap to clone; every clone observes the same underlying
/// flag. The supervisor polls it between buckets via
/// [`kite_scheduler::TickScheduler::run_cancellable`] — a cancelled session
/// stops between ticks, never mid-tick.
#[derive(Debug, Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
