//! Single-shot stop signal
//!
//! A level-triggered broadcast: open until closed, closed forever after.
//! Closing twice is a no-op, so racing closers never need to coordinate.

use std::sync::Arc;
use tokio::sync::watch;

/// Broadcast stop signal shared by the accept loop, pipes and drains
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    /// Create an open signal
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Close the signal
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn close(&self) -> bool {
        self.tx.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    /// Whether the signal has been closed
    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal is closed (immediately if it already is)
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this cannot fail with a closed channel
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Whether `other` is a handle to this same signal
    pub fn same_as(&self, other: &StopSignal) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
