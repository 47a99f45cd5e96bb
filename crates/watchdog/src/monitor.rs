//! Subscriber side of the watchdog
//!
//! Maps incoming topics to heartbeat sources, touches the registry and runs
//! the range safety filter on scans of the proximity source.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{Envelope, GuardBlueprint, InterruptLevel, Message};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::aggregator::SafetyAggregator;
use crate::error::{Result, WatchdogError};
use crate::proximity::{ProximityFilter, ProximityHit};
use crate::registry::{HeartbeatRegistry, SourceKey};

/// What one message did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// Topic not watched
    Ignored,
    Heartbeat(SourceKey),
    Proximity(SourceKey, ProximityHit),
}

pub struct SafetyMonitor {
    registry: Arc<HeartbeatRegistry>,
    filter: Arc<ProximityFilter>,
    aggregator: Arc<SafetyAggregator>,
    routes: HashMap<String, SourceKey>,
    proximity_topic: String,
    immediate_publish: bool,
}

impl SafetyMonitor {
    /// Build the topic routes from the watched sources
    pub fn new(
        blueprint: &GuardBlueprint,
        filter: Arc<ProximityFilter>,
        aggregator: Arc<SafetyAggregator>,
    ) -> Result<Self> {
        let registry = aggregator.registry().clone();
        let mut routes = HashMap::new();
        for source in &blueprint.watchdog.sources {
            let key = registry
                .lookup(&source.name)
                .ok_or_else(|| WatchdogError::UnknownSource(source.name.clone()))?;
            routes.insert(source.topic.clone(), key);
        }

        let proximity_source = &blueprint.proximity.source;
        let proximity_topic = blueprint
            .source_topic(proximity_source)
            .ok_or_else(|| WatchdogError::UnknownSource(proximity_source.clone()))?
            .to_string();

        Ok(Self {
            registry,
            filter,
            aggregator,
            routes,
            proximity_topic,
            immediate_publish: blueprint.watchdog.immediate_publish,
        })
    }

    /// Topics this monitor needs to receive
    pub fn topics(&self) -> impl Iterator<Item = &str> + '_ {
        self.routes.keys().map(String::as_str)
    }

    /// Handle one message from the bus
    pub fn observe(&self, envelope: &Envelope) -> Observation {
        let Some(&key) = self.routes.get(&envelope.topic) else {
            return Observation::Ignored;
        };
        self.registry.touch(key);
        observability::record_heartbeat(self.registry.name(key).as_str());
        trace!(topic = %envelope.topic, kind = envelope.message.kind(), "heartbeat");

        if envelope.topic != self.proximity_topic {
            return Observation::Heartbeat(key);
        }
        let Message::Range(scan) = &envelope.message else {
            return Observation::Heartbeat(key);
        };
        match self.filter.inspect(scan) {
            Some(hit) => {
                // only PROXIMITY goes out from here; CLEAR waits for the tick
                if self.immediate_publish {
                    self.aggregator.publish(InterruptLevel::Proximity);
                }
                Observation::Proximity(key, hit)
            }
            None => Observation::Heartbeat(key),
        }
    }

    /// Consume a subscription until every sender is gone
    pub async fn run(&self, mut rx: mpsc::Receiver<Envelope>) -> u64 {
        let mut observed = 0u64;
        while let Some(envelope) = rx.recv().await {
            self.observe(&envelope);
            observed += 1;
        }
        debug!(observed, "safety monitor subscription closed");
        observed
    }
}
