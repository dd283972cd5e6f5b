//! Stop signal for the configuration subsystem's background tasks.
//!
//! The signal is level-triggered: a task that starts listening after
//! [`Shutdown::trigger`] still sees it, so a heartbeat spawned late in
//! startup cannot miss a shutdown that raced it.

use tokio::sync::watch;

/// Owner side of the stop signal. Clones fire the same signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// A listener for background tasks.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the signal. Idempotent.
    pub fn trigger(&self) {
        if !self.tx.send_replace(true) {
            tracing::debug!(listeners = self.tx.receiver_count(), "Shutdown triggered");
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener side, held by each background task.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown has been triggered, or immediately if it already was.
    ///
    /// Also resolves when every [`Shutdown`] has been dropped.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
