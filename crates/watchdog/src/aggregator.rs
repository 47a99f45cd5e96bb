//! Safety aggregator
//!
//! Periodic evaluation: a pending proximity assertion wins, otherwise any
//! stale source gives STALE, otherwise CLEAR. The level is published on
//! every tick, changed or not.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use contracts::{
    Envelope, InterruptLevel, InterruptMessage, Message, SharedPublisher, SourceId,
};
use observability::{GuardMetricsAggregator, GuardSummary};
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::proximity::ProximityFilter;
use crate::registry::{HeartbeatRegistry, SourceStatus};

/// `current()` before the first evaluation
const NO_LEVEL: u8 = u8::MAX;

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub level: InterruptLevel,
    pub stale_sources: Vec<SourceId>,
    /// A proximity assertion was consumed
    pub proximity: bool,
}

/// Combine per-source freshness with a proximity assertion
pub fn combine(sources: &[SourceStatus], proximity: bool) -> InterruptLevel {
    if proximity {
        InterruptLevel::Proximity
    } else if sources.iter().any(|s| s.stale) {
        InterruptLevel::Stale
    } else {
        InterruptLevel::Clear
    }
}

pub struct SafetyAggregator {
    registry: Arc<HeartbeatRegistry>,
    proximity: Arc<ProximityFilter>,
    publisher: SharedPublisher,
    topic: String,
    current: AtomicU8,
    stats: Mutex<GuardMetricsAggregator>,
}

impl SafetyAggregator {
    pub fn new(
        registry: Arc<HeartbeatRegistry>,
        proximity: Arc<ProximityFilter>,
        publisher: SharedPublisher,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            proximity,
            publisher,
            topic: topic.into(),
            current: AtomicU8::new(NO_LEVEL),
            stats: Mutex::new(GuardMetricsAggregator::new()),
        }
    }

    pub fn registry(&self) -> &Arc<HeartbeatRegistry> {
        &self.registry
    }

    /// Level of the most recent evaluation
    pub fn current(&self) -> Option<InterruptLevel> {
        InterruptLevel::from_u8(self.current.load(Ordering::Acquire))
    }

    pub fn evaluate(&self) -> Evaluation {
        self.evaluate_at(Instant::now())
    }

    pub fn evaluate_at(&self, now: Instant) -> Evaluation {
        let sources = self.registry.snapshot_at(now);
        let proximity = self.proximity.take();
        let level = combine(&sources, proximity);
        let stale_sources: Vec<SourceId> = sources
            .iter()
            .filter(|s| s.stale)
            .map(|s| s.name.clone())
            .collect();

        let previous = InterruptLevel::from_u8(self.current.swap(level.as_u8(), Ordering::AcqRel));
        if previous != Some(level) {
            self.log_transition(previous, level, &stale_sources);
        }

        observability::record_interrupt_level(level);
        for s in &sources {
            observability::record_source_age(s.name.as_str(), s.age.as_secs_f64(), s.stale);
        }
        {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            stats.update(
                level,
                sources
                    .iter()
                    .map(|s| (s.name.as_str(), s.age.as_secs_f64(), s.stale)),
            );
            if proximity {
                stats.record_proximity();
            }
        }

        Evaluation {
            level,
            stale_sources,
            proximity,
        }
    }

    fn log_transition(
        &self,
        previous: Option<InterruptLevel>,
        level: InterruptLevel,
        stale_sources: &[SourceId],
    ) {
        if let Some(from) = previous {
            observability::record_level_transition(from, level);
        }
        let from = previous.map(InterruptLevel::as_str).unwrap_or("none");
        match level {
            InterruptLevel::Clear => info!(from, "interrupt cleared"),
            InterruptLevel::Stale => {
                let names: Vec<&str> = stale_sources.iter().map(SourceId::as_str).collect();
                warn!(from, stale = ?names, "heartbeat stale, interrupt raised");
            }
            InterruptLevel::Proximity => warn!(from, "proximity interrupt raised"),
        }
    }

    /// Publish a level on the interrupt topic
    pub fn publish(&self, level: InterruptLevel) {
        let envelope = Envelope::new(
            self.topic.as_str(),
            Message::Interrupt(InterruptMessage::now(level)),
        );
        if let Err(e) = self.publisher.publish(envelope) {
            warn!(topic = %self.topic, level = %level, error = %e, "interrupt publish failed");
        }
    }

    /// Evaluate and publish
    pub fn tick(&self) -> Evaluation {
        let evaluation = self.evaluate();
        self.publish(evaluation.level);
        evaluation
    }

    /// Tick on `cadence` until `shutdown` resolves; returns the tick count
    #[instrument(name = "safety_aggregator_run", skip(self, shutdown))]
    pub async fn run<F>(self: Arc<Self>, cadence: Duration, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut ticks = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick();
                    ticks += 1;
                }
            }
        }
        debug!(ticks, "safety aggregator stopped");
        ticks
    }

    pub fn summary(&self) -> GuardSummary {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary()
    }
}
