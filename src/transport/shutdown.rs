//! Explicit stop signal for long-running loops.
//!
//! A [`Shutdown`] handle owns the sending side of a watch channel; every
//! [`ShutdownSignal`] cloned from it observes the same flag. Loops check
//! [`ShutdownSignal::is_shutdown`] once per pass and may also await
//! [`ShutdownSignal::wait`] alongside other work.

use tokio::sync::watch;

/// Trigger side of the stop signal.
#[derive(Debug)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new, untriggered shutdown handle.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Get a signal that observes this handle.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Check if shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of the stop signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// A signal that never fires, for loops run until process exit.
    pub fn never() -> Self {
        let (sender, receiver) = watch::channel(false);
        // Closed channel: `wait` pends forever
        drop(sender);
        Self { receiver }
    }

    /// Check if shutdown has been signaled.
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for the shutdown signal.
    ///
    /// Pends forever if the trigger was dropped without firing.
    pub async fn wait(&mut self) {
        if *self.receiver.borrow() {
            return;
        }
        while self.receiver.changed().await.is_ok() {
            if *self.receiver.borrow() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}
