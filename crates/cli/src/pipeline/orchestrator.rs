//! Pipeline orchestrator - wires every component together.
//!
//! mock sensor -> bridge -> bus -> dispatcher -> (sinks, safety monitor)
//! and the aggregator publishing the interrupt level back onto the bus.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use acquisition::{AcquisitionBridge, RotationController, RotationSettings, Scratch};
use anyhow::{Context, Result};
use contracts::{GuardBlueprint, SharedPublisher};
use dispatcher::DispatcherBuilder;
use hardware::{HardwareTransport, MockGuidance, MockGuidanceConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use watchdog::{HeartbeatRegistry, ProximityFilter, SafetyAggregator, SafetyMonitor};

use super::feeds::spawn_feeds;
use super::{wait_stop, PipelineStats};
use crate::error::CliError;

/// Name of the in-process subscription feeding the watchdog
const MONITOR_SUBSCRIPTION: &str = "safety_monitor";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blueprint: GuardBlueprint,

    /// Stop after this long (None = until shutdown)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the duration elapses or acquisition fails
    ///
    /// Everything is torn down in order either way: transport released,
    /// watchdog and feeds stopped, bus closed and sinks drained. A fatal
    /// acquisition error is returned after teardown.
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let PipelineConfig {
            blueprint: bp,
            duration,
            metrics_port,
        } = self.config;

        if let Some(port) = metrics_port {
            observability::init_metrics_only(port)?;
        }

        // Bus
        let (bus, bus_rx) = dispatcher::bus(bp.bridge.bus_capacity);
        let publisher: SharedPublisher = Arc::new(bus.clone());

        // Watchdog
        let registry =
            Arc::new(HeartbeatRegistry::from_config(&bp.watchdog).map_err(CliError::from)?);
        let filter = Arc::new(ProximityFilter::from_config(&bp.proximity));
        let aggregator = Arc::new(SafetyAggregator::new(
            registry.clone(),
            filter.clone(),
            publisher.clone(),
            bp.topics.interrupt.clone(),
        ));
        let monitor =
            SafetyMonitor::new(&bp, filter, aggregator.clone()).map_err(CliError::from)?;
        info!(
            sources = registry.len(),
            cadence_ms = bp.watchdog.cadence_ms,
            "Watchdog configured"
        );

        // Dispatcher
        if bp.sinks.is_empty() {
            warn!("No sinks configured - only the watchdog consumes the bus");
        }
        let mut builder = DispatcherBuilder::new(bp.sinks.clone(), bus_rx);
        let subscription = builder.subscribe(
            MONITOR_SUBSCRIPTION,
            monitor.topics().map(str::to_string).collect(),
            bp.bridge.bus_capacity,
        );
        let dispatcher_task = builder.build().await.map_err(CliError::from)?.spawn();
        let monitor_task = tokio::spawn(async move { monitor.run(subscription).await });

        // Evaluation loop and simulated feeds
        let (stop_tx, stop_rx) = watch::channel(false);
        let aggregator_task = tokio::spawn(
            aggregator
                .clone()
                .run(bp.watchdog.cadence(), wait_stop(stop_rx.clone())),
        );
        let feeds = spawn_feeds(&bp, publisher.clone(), stop_rx);

        // Acquisition
        let sim = &bp.simulation;
        let mock = Arc::new(MockGuidance::new(MockGuidanceConfig {
            rate_hz: sim.hardware_rate_hz,
            obstacle_distance_cm: sim.obstacle_distance_cm,
            ultrasonic_mm: sim.ultrasonic_mm,
            ..Default::default()
        }));
        let transport: Arc<dyn HardwareTransport> = mock;
        let cameras = bp.rotation.descriptors()?;
        let first = cameras
            .first()
            .cloned()
            .context("camera rotation is empty")?;
        let scratch = Arc::new(Scratch::new(first));
        let bridge = Arc::new(AcquisitionBridge::new(
            publisher,
            bp.topics.clone(),
            bp.bridge.show_info,
            scratch.clone(),
        ));
        let mut rotation = RotationController::new(
            transport,
            cameras,
            scratch,
            bridge.cycle().clone(),
            RotationSettings::from_config(&bp.rotation),
        )
        .map_err(CliError::from)?;

        let acquisition = async {
            rotation.log_camera_info()?;
            rotation.start(bridge.callback())?;
            info!("Pipeline running (mock sensor)");
            rotation.run_until(run_limit(shutdown, duration)).await
        }
        .await;

        // Teardown
        info!("Shutting down pipeline...");
        bridge.detach();
        if let Err(e) = rotation.shutdown().await {
            warn!(error = %e, "Transport shutdown failed");
        }

        let _ = stop_tx.send(true);
        let ticks = join_or_log(aggregator_task, "aggregator").await;
        let mut feed_counts = Vec::with_capacity(feeds.len());
        for feed in feeds {
            let sent = join_or_log(feed.task, "feed").await;
            feed_counts.push((feed.source, sent));
        }

        bus.close();
        let sinks = join_or_log(dispatcher_task, "dispatcher").await;
        let observed = join_or_log(monitor_task, "monitor").await;

        let stats = PipelineStats {
            duration: started.elapsed(),
            ticks,
            rotations: rotation.rotations(),
            observed,
            final_level: aggregator.current(),
            bridge: bridge.metrics().snapshot(),
            bus: bus.metrics().counts(),
            feeds: feed_counts,
            sinks,
            guard: aggregator.summary(),
        };
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            ticks = stats.ticks,
            "Pipeline shutdown complete"
        );

        acquisition.map_err(CliError::from)?;
        Ok(stats)
    }
}

/// Resolves on `shutdown` or when `duration` has elapsed
async fn run_limit<F>(shutdown: F, duration: Option<Duration>)
where
    F: Future<Output = ()>,
{
    let limit = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        _ = shutdown => {}
        _ = limit => info!("Run duration reached"),
    }
}

async fn join_or_log<T: Default>(task: JoinHandle<T>, name: &str) -> T {
    task.await.unwrap_or_else(|e| {
        warn!(task = name, error = %e, "Task ended abnormally");
        T::default()
    })
}
