//! Per-sink and bus counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters of one sink worker
#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    written: AtomicU64,
    failed: AtomicU64,
    /// Queue full on hand-off
    dropped: AtomicU64,
    /// Rejected by the topic filter
    filtered: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, success: bool) {
        let counter = if success { &self.written } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SinkSnapshot {
        SinkSnapshot {
            queue_len: self.queue_len.load(Ordering::Relaxed),
            written: self.written(),
            failed: self.failed(),
            dropped: self.dropped(),
            filtered: self.filtered.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time sink counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkSnapshot {
    pub queue_len: usize,
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
    pub filtered: u64,
}

/// Counters of the publish bus
#[derive(Debug, Default)]
pub struct BusMetrics {
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl BusMetrics {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// `(accepted, dropped)`
    pub fn counts(&self) -> (u64, u64) {
        (
            self.accepted.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
        )
    }
}
