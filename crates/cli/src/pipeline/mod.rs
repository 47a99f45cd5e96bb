//! Pipeline orchestration module.

mod feeds;
mod orchestrator;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;

use tokio::sync::watch;

/// Resolves once the stop flag is raised or its sender is gone
pub(crate) async fn wait_stop(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|&stopped| stopped).await;
}
