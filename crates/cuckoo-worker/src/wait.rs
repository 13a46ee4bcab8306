//! Cancellable timed waits.
//!
//! The orchestrator sleeps in two places: between submission attempts and
//! between status polls. Both sleeps go through [`Wait`], so a single
//! [`Canceller`] aborts a running analysis wherever it is waiting.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration passed
    Elapsed,
    /// The wait was cancelled
    Cancelled,
}

impl WaitOutcome {
    /// Returns true if the wait was cancelled
    #[must_use]
    pub const fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Handle that cancels every [`Wait`] created with it
#[derive(Debug, Clone)]
pub struct Canceller {
    tx: Arc<watch::Sender<bool>>,
}

impl Canceller {
    /// Cancel current and future waits
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once [`cancel`](Self::cancel) was called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Timer that can be interrupted by its [`Canceller`]
#[derive(Debug, Clone)]
pub struct Wait {
    rx: watch::Receiver<bool>,
}

impl Wait {
    /// A wait and the handle that cancels it
    #[must_use]
    pub fn new() -> (Canceller, Self) {
        let (tx, rx) = watch::channel(false);
        (Canceller { tx: Arc::new(tx) }, Self { rx })
    }

    /// A wait nobody can cancel
    #[must_use]
    pub fn uncancellable() -> Self {
        Self::new().1
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns [`WaitOutcome::Cancelled`] immediately if cancellation already
    /// happened.
    pub async fn sleep(&self, duration: Duration) -> WaitOutcome {
        let mut rx = self.rx.clone();
        if *rx.borrow_and_update() {
            return WaitOutcome::Cancelled;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => WaitOutcome::Elapsed,
            () = cancelled(&mut rx) => WaitOutcome::Cancelled,
        }
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    // A dropped canceller can never fire.
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
