//! Heartbeat registry
//!
//! Fixed set of named sources, each with one atomic word holding the last
//! arrival as microseconds since the registry epoch. A word is written and
//! read whole, so a snapshot never sees a torn timestamp. Concurrent touches
//! keep the latest value (`fetch_max`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::{SourceId, WatchdogConfig};
use serde::Serialize;
use tokio::time::Instant;

use crate::error::{Result, WatchdogError};

/// Handle of a registered source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKey(usize);

#[derive(Debug)]
struct SourceSlot {
    name: SourceId,
    threshold: Duration,
    last_seen_us: AtomicU64,
}

/// Freshness of one source at evaluation time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub name: SourceId,
    pub age: Duration,
    pub threshold: Duration,
    pub stale: bool,
}

#[derive(Debug)]
pub struct HeartbeatRegistry {
    epoch: Instant,
    slots: Vec<SourceSlot>,
    index: HashMap<SourceId, SourceKey>,
}

impl HeartbeatRegistry {
    /// Every source starts as seen at `epoch`
    pub fn new(
        epoch: Instant,
        sources: impl IntoIterator<Item = (SourceId, Duration)>,
    ) -> Result<Self> {
        let mut slots = Vec::new();
        let mut index = HashMap::new();
        for (name, threshold) in sources {
            let key = SourceKey(slots.len());
            if index.insert(name.clone(), key).is_some() {
                return Err(WatchdogError::DuplicateSource(name.to_string()));
            }
            slots.push(SourceSlot {
                name,
                threshold,
                last_seen_us: AtomicU64::new(0),
            });
        }
        if slots.is_empty() {
            return Err(WatchdogError::NoSources);
        }
        Ok(Self {
            epoch,
            slots,
            index,
        })
    }

    /// Fails on an unusable threshold instead of panicking
    pub fn from_config(config: &WatchdogConfig) -> Result<Self> {
        let sources = config
            .sources
            .iter()
            .map(|s| Ok((SourceId::new(&s.name), config.threshold_for(s)?)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(Instant::now(), sources)
    }

    pub fn lookup(&self, name: &str) -> Option<SourceKey> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn name(&self, key: SourceKey) -> &SourceId {
        &self.slots[key.0].name
    }

    pub fn names(&self) -> impl Iterator<Item = &SourceId> + '_ {
        self.slots.iter().map(|s| &s.name)
    }

    /// Record an arrival now
    pub fn touch(&self, key: SourceKey) {
        self.touch_at(key, Instant::now());
    }

    /// Record an arrival at `at`; older timestamps than the stored one are ignored
    pub fn touch_at(&self, key: SourceKey, at: Instant) {
        let micros = at.saturating_duration_since(self.epoch).as_micros() as u64;
        self.slots[key.0]
            .last_seen_us
            .fetch_max(micros, Ordering::AcqRel);
    }

    pub fn last_seen(&self, key: SourceKey) -> Instant {
        let micros = self.slots[key.0].last_seen_us.load(Ordering::Acquire);
        self.epoch + Duration::from_micros(micros)
    }

    pub fn snapshot(&self) -> Vec<SourceStatus> {
        self.snapshot_at(Instant::now())
    }

    /// Age and staleness of every source relative to `now`
    pub fn snapshot_at(&self, now: Instant) -> Vec<SourceStatus> {
        self.slots
            .iter()
            .map(|slot| {
                let micros = slot.last_seen_us.load(Ordering::Acquire);
                let last_seen = self.epoch + Duration::from_micros(micros);
                let age = now.saturating_duration_since(last_seen);
                SourceStatus {
                    name: slot.name.clone(),
                    age,
                    threshold: slot.threshold,
                    stale: age > slot.threshold,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const THRESHOLD: Duration = Duration::from_millis(500);

    fn registry(epoch: Instant, names: &[&str]) -> HeartbeatRegistry {
        HeartbeatRegistry::new(epoch, names.iter().map(|n| (SourceId::new(n), THRESHOLD))).unwrap()
    }

    #[test]
    fn test_sources_fresh_at_creation() {
        let epoch = Instant::now();
        let reg = registry(epoch, &["velocity", "attitude"]);
        let snapshot = reg.snapshot_at(epoch + Duration::from_millis(100));
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|s| !s.stale));
    }

    #[test]
    fn test_age_beyond_threshold_is_stale() {
        let epoch = Instant::now();
        let reg = registry(epoch, &["velocity", "attitude"]);
        let attitude = reg.lookup("attitude").unwrap();
        reg.touch_at(attitude, epoch + Duration::from_millis(500));

        let snapshot = reg.snapshot_at(epoch + Duration::from_millis(600));
        assert!(snapshot[0].stale);
        assert_eq!(snapshot[0].age, Duration::from_millis(600));
        assert!(!snapshot[1].stale);
        assert_eq!(snapshot[1].age, Duration::from_millis(100));
    }

    #[test]
    fn test_exact_threshold_not_stale() {
        let epoch = Instant::now();
        let reg = registry(epoch, &["velocity"]);
        let snapshot = reg.snapshot_at(epoch + THRESHOLD);
        assert!(!snapshot[0].stale);
    }

    #[test]
    fn test_older_touch_ignored() {
        let epoch = Instant::now();
        let reg = registry(epoch, &["velocity"]);
        let key = reg.lookup("velocity").unwrap();
        reg.touch_at(key, epoch + Duration::from_millis(300));
        reg.touch_at(key, epoch + Duration::from_millis(100));
        assert_eq!(reg.last_seen(key), epoch + Duration::from_millis(300));
    }

    #[test]
    fn test_duplicate_and_empty_rejected() {
        let epoch = Instant::now();
        let dup = HeartbeatRegistry::new(
            epoch,
            [(SourceId::new("a"), THRESHOLD), (SourceId::new("a"), THRESHOLD)],
        );
        assert!(matches!(dup, Err(WatchdogError::DuplicateSource(name)) if name == "a"));

        let empty = HeartbeatRegistry::new(epoch, std::iter::empty::<(SourceId, Duration)>());
        assert!(matches!(empty, Err(WatchdogError::NoSources)));
    }

    #[test]
    fn test_from_config_uses_overrides() {
        let mut config = WatchdogConfig::default();
        config.sources[0].threshold_s = Some(2.0);
        let reg = HeartbeatRegistry::from_config(&config).unwrap();
        assert_eq!(reg.len(), 6);
        let snapshot = reg.snapshot();
        assert_eq!(snapshot[0].threshold, Duration::from_secs(2));
        assert_eq!(snapshot[1].threshold, Duration::from_millis(500));
        assert!(reg.lookup("unknown").is_none());
    }

    #[test]
    fn test_infinite_threshold_is_an_error() {
        let mut config = WatchdogConfig::default();
        config.staleness_threshold_s = f64::INFINITY;
        let err = HeartbeatRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, WatchdogError::Contract(_)));

        let mut config = WatchdogConfig::default();
        config.sources[4].threshold_s = Some(f64::NAN);
        assert!(HeartbeatRegistry::from_config(&config).is_err());
    }

    #[test]
    fn test_concurrent_touches_from_distinct_sources() {
        let epoch = Instant::now();
        let names = ["a", "b", "c", "d"];
        let reg = Arc::new(registry(epoch, &names));

        let handles: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let reg = reg.clone();
                let key = reg.lookup(name).unwrap();
                std::thread::spawn(move || {
                    for step in 1..=1000u64 {
                        reg.touch_at(key, epoch + Duration::from_micros(step * (i as u64 + 1)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for (i, name) in names.iter().enumerate() {
            let key = reg.lookup(name).unwrap();
            assert_eq!(
                reg.last_seen(key),
                epoch + Duration::from_micros(1000 * (i as u64 + 1))
            );
        }
    }
}
