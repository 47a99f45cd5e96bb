//! Range safety filter
//!
//! Inspects each short-range scan as it arrives. A qualifying sector sets a
//! one-shot assertion that the next aggregator evaluation consumes; nothing
//! is latched beyond that evaluation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use contracts::{ProximityConfig, RangeScan};
use tracing::warn;

/// First qualifying sector of a scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityHit {
    pub sector: usize,
    pub range_m: f32,
}

#[derive(Debug)]
pub struct ProximityFilter {
    threshold_m: f32,
    valid_marker: f32,
    ignored_sectors: Vec<usize>,
    pending: AtomicBool,
    triggers: AtomicU64,
}

impl ProximityFilter {
    pub fn new(threshold_m: f32, valid_marker: f32) -> Self {
        Self {
            threshold_m,
            valid_marker,
            ignored_sectors: Vec::new(),
            pending: AtomicBool::new(false),
            triggers: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &ProximityConfig) -> Self {
        Self {
            ignored_sectors: config.ignored_sectors.clone(),
            ..Self::new(config.distance_threshold_m, config.valid_marker)
        }
    }

    /// `0 < range < threshold` with the reliability marker set
    fn qualifies(&self, sector: usize, range: f32, validity: f32) -> bool {
        !self.ignored_sectors.contains(&sector)
            && range > 0.0
            && range < self.threshold_m
            && (validity - self.valid_marker).abs() < f32::EPSILON
    }

    /// Check one scan; asserts proximity if any sector qualifies
    pub fn inspect(&self, scan: &RangeScan) -> Option<ProximityHit> {
        let hit = scan
            .sectors()
            .find(|&(sector, range, validity)| self.qualifies(sector, range, validity))
            .map(|(sector, range_m, _)| ProximityHit { sector, range_m })?;

        self.pending.store(true, Ordering::Release);
        self.triggers.fetch_add(1, Ordering::Relaxed);
        observability::record_proximity_trigger(hit.sector, hit.range_m);
        warn!(
            sector = hit.sector,
            range_m = hit.range_m,
            threshold_m = self.threshold_m,
            frame = %scan.header.frame_id,
            "obstacle within proximity threshold"
        );
        Some(hit)
    }

    /// Consume the pending assertion
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Qualifying scans seen so far
    pub fn triggers(&self) -> u64 {
        self.triggers.load(Ordering::Relaxed)
    }
}
