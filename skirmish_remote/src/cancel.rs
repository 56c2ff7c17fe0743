use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative abort flag for blocking waits.
///
/// Wait loops check it once per iteration. The UI (or a test) holds a clone
/// and calls `cancel` when the player presses escape; the wait then returns
/// `RemoteError::Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Re-arm after a handled abort.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
