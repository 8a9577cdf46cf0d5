//! Shutdown coordination for the front end.

use std::sync::Arc;
use tokio::sync::watch;

/// Broadcast cancellation signal shared by every worker.
///
/// Cloning is cheap; all clones observe the same signal. Triggering is
/// idempotent, and a worker that starts waiting after the trigger returns
/// immediately instead of missing it.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Has shutdown begun?
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until shutdown is triggered.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so the channel cannot close
        // while we wait.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
