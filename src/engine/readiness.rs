//! Readiness flag shared by the schema uploader and the readiness gate
//!
//! Starts "not ready" and flips to ready exactly once. There is a single
//! writer ([`ReadinessSignal`], owned by the uploader) and any number of
//! readers ([`Readiness`], cloned into the HTTP front).

use tokio::sync::watch;
use tracing::info;

/// Create a connected writer/reader pair, initially not ready
pub fn readiness() -> (ReadinessSignal, Readiness) {
    let (sender, receiver) = watch::channel(false);
    (ReadinessSignal { sender }, Readiness { receiver })
}

/// Write side of the readiness flag
#[derive(Debug)]
pub struct ReadinessSignal {
    sender: watch::Sender<bool>,
}

impl ReadinessSignal {
    /// Mark the gateway ready; returns `true` only for the call that flipped the flag
    pub fn mark_ready(&self) -> bool {
        let flipped = self.sender.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });

        if flipped {
            info!("🟢 GraphQL API is ready");
        }
        flipped
    }

    pub fn subscribe(&self) -> Readiness {
        Readiness {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Read side of the readiness flag
#[derive(Debug, Clone)]
pub struct Readiness {
    receiver: watch::Receiver<bool>,
}

impl Readiness {
    /// A reader that is ready from the start, with no writer attached
    pub fn always_ready() -> Self {
        let (_, receiver) = watch::channel(true);
        Self { receiver }
    }

    pub fn is_ready(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait until the flag flips; returns immediately when already ready
    pub async fn wait_ready(&self) {
        let mut receiver = self.receiver.clone();
        // An error means the writer is gone; the flag can no longer change
        let _ = receiver.wait_for(|ready| *ready).await;
    }
}
