//! Cycle-ready event
//!
//! Set from the callback thread after every payload, consumed by the rotation
//! loop. Signals coalesce: any number of payloads since the last wait release
//! exactly one waiter.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Waker};
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{AcquisitionError, Result};

/// One-shot "at least one payload processed" event
#[derive(Debug, Default)]
pub struct CycleSignal {
    notify: Notify,
    signals: AtomicU64,
}

impl CycleSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a payload as processed; callable from any thread
    pub fn signal(&self) {
        self.signals.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
    }

    /// Wait for the next signal (or consume a stored one)
    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    /// Wait with an optional bound; expiry is fatal for the caller
    pub async fn wait_for(&self, timeout: Option<Duration>) -> Result<()> {
        match timeout {
            None => {
                self.wait().await;
                Ok(())
            }
            Some(limit) => tokio::time::timeout(limit, self.wait())
                .await
                .map_err(|_| AcquisitionError::CycleTimeout {
                    timeout_ms: limit.as_millis() as u64,
                }),
        }
    }

    /// Drop a stored permit left by payloads of the previous selection
    ///
    /// A signal raised concurrently is not lost: the pending waiter hands it
    /// back when dropped.
    pub fn clear(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        let mut cx = Context::from_waker(Waker::noop());
        let _ = notified.as_mut().poll(&mut cx);
    }

    /// Total signals raised
    pub fn count(&self) -> u64 {
        self.signals.load(Ordering::Relaxed)
    }
}
