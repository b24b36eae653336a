//! Cancellable waiting.
//!
//! Every suspension in the crate (transport pacing aside) goes through
//! [`Shutdown::sleep`], so a fade or the scheduler loop stops as soon as the
//! trigger fires instead of at the end of a multi-hour wait.

use std::time::Duration;

use tokio::sync::watch;
use tracing::trace;

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Cancelled,
}

/// Fires the shutdown. Dropping it without firing leaves waits uncancelled.
#[derive(Debug)]
pub struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // send_replace never fails, even with every receiver gone
        self.sender.send_replace(true);
    }
}

/// Receiving half, cloned into every task that waits
#[derive(Debug, Clone)]
pub struct Shutdown {
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (ShutdownTrigger, Shutdown) {
        let (sender, receiver) = watch::channel(false);
        (ShutdownTrigger { sender }, Shutdown { receiver })
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Sleeps for `duration` unless shutdown is triggered first
    pub async fn sleep(&mut self, duration: Duration) -> WaitOutcome {
        if self.is_triggered() {
            return WaitOutcome::Cancelled;
        }

        trace!("Sleeping for {:?}", duration);
        let receiver = &mut self.receiver;
        let stopped = async move {
            let triggered = receiver.wait_for(|stop| *stop).await.is_ok();
            if !triggered {
                // Trigger dropped without firing: nothing can cancel us any more
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(duration) => WaitOutcome::Elapsed,
            _ = stopped => {
                trace!("Sleep cancelled");
                WaitOutcome::Cancelled
            }
        }
    }
}
