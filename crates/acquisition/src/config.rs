//! Bridge counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Bridge metrics
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// Total payloads received
    pub payloads_received: AtomicU64,

    /// Payloads dropped as malformed or empty
    pub payloads_dropped: AtomicU64,

    /// Payloads of kinds the bridge does not republish
    pub payloads_ignored: AtomicU64,

    /// Messages accepted by the publisher
    pub messages_published: AtomicU64,

    /// Messages the publisher refused (queue full / closed)
    pub publish_failures: AtomicU64,
}

impl BridgeMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.payloads_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.payloads_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.payloads_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> BridgeSnapshot {
        BridgeSnapshot {
            payloads_received: self.payloads_received.load(Ordering::Relaxed),
            payloads_dropped: self.payloads_dropped.load(Ordering::Relaxed),
            payloads_ignored: self.payloads_ignored.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeSnapshot {
    pub payloads_received: u64,
    pub payloads_dropped: u64,
    pub payloads_ignored: u64,
    pub messages_published: u64,
    pub publish_failures: u64,
}
