//! Simulated heartbeat feeds
//!
//! Stand-ins for the parts of the robot the mock sensor does not cover
//! (attitude, position, velocity, motion command, depth-derived scan). Each
//! feed publishes a plausible message on its source topic at a fixed rate and
//! can be told to fall silent after a while.

use std::time::Duration;

use contracts::{
    period_from_hz, Envelope, FeedConfig, GuardBlueprint, Header, JoyCommand, Message,
    PointStamped, RangeScan, SharedPublisher, Vector3, Vector3Stamped, CAMERA_PAIR_COUNT,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::wait_stop;

/// Range reported by simulated scans (m), well clear of any threshold
const CLEAR_RANGE_M: f32 = 10.0;

/// A running feed
pub struct FeedTask {
    pub source: String,
    pub task: JoinHandle<u64>,
}

/// Spawn one task per configured feed
///
/// Feeds for unknown sources are skipped; config validation rejects them.
pub fn spawn_feeds(
    blueprint: &GuardBlueprint,
    publisher: SharedPublisher,
    stop: watch::Receiver<bool>,
) -> Vec<FeedTask> {
    let marker = blueprint.proximity.valid_marker;
    blueprint
        .simulation
        .feeds
        .iter()
        .filter_map(|feed| {
            let Some(topic) = blueprint.source_topic(&feed.source) else {
                warn!(source = %feed.source, "Feed for unwatched source skipped");
                return None;
            };
            let task = tokio::spawn(run_feed(
                feed.clone(),
                topic.to_string(),
                marker,
                publisher.clone(),
                stop.clone(),
            ));
            Some(FeedTask {
                source: feed.source.clone(),
                task,
            })
        })
        .collect()
}

/// Message shape a real publisher of `source` would send
fn heartbeat_message(source: &str, marker: f32) -> Message {
    let header = Header::now(source);
    match source {
        "local_position" => Message::Point(PointStamped {
            header,
            point: Vector3 { x: 0.0, y: 0.0, z: 1.5 },
        }),
        "vel_cmd" => Message::Joy(JoyCommand {
            header,
            axes: vec![0.0; 4],
            buttons: Vec::new(),
        }),
        "laser_scan" | "ultrasonic" => Message::Range(RangeScan {
            header,
            ranges: vec![CLEAR_RANGE_M; CAMERA_PAIR_COUNT],
            intensities: vec![marker; CAMERA_PAIR_COUNT],
        }),
        _ => Message::Vector3(Vector3Stamped {
            header,
            vector: Vector3 { x: 0.0, y: 0.0, z: 0.0 },
        }),
    }
}

async fn run_feed(
    feed: FeedConfig,
    topic: String,
    marker: f32,
    publisher: SharedPublisher,
    stop: watch::Receiver<bool>,
) -> u64 {
    let period = match period_from_hz("rate_hz", feed.rate_hz) {
        Ok(period) => period,
        Err(e) => {
            warn!(source = %feed.source, error = %e, "Simulated feed not started");
            return 0;
        }
    };
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // unusable or far-future cutoffs mean the feed never goes silent
    let silent_at = feed
        .silent_after_s
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .and_then(|d| Instant::now().checked_add(d));
    let stop = wait_stop(stop);
    tokio::pin!(stop);

    let mut sent = 0u64;
    let mut silenced = false;
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = interval.tick() => {
                if silent_at.is_some_and(|at| Instant::now() >= at) {
                    if !silenced {
                        info!(source = %feed.source, sent, "Simulated feed went silent");
                        silenced = true;
                    }
                    continue;
                }
                let envelope = Envelope::new(topic.as_str(), heartbeat_message(&feed.source, marker));
                match publisher.publish(envelope) {
                    Ok(()) => sent += 1,
                    Err(e) => debug!(source = %feed.source, error = %e, "Feed publish failed"),
                }
            }
        }
    }
    sent
}
