//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

use super::load_blueprint;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");
    let mut blueprint = load_blueprint(&args.config)?;

    if let Some(threshold) = args.threshold {
        info!(threshold_s = threshold, "Overriding staleness threshold from CLI");
        blueprint.watchdog.staleness_threshold_s = threshold;
    }
    if let Some(distance) = args.proximity_m {
        info!(distance_m = distance, "Overriding proximity threshold from CLI");
        blueprint.proximity.distance_threshold_m = distance;
    }
    if args.threshold.is_some() || args.proximity_m.is_some() {
        config_loader::ConfigLoader::validate(&blueprint).context("CLI override rejected")?;
    }

    info!(
        sources = blueprint.watchdog.sources.len(),
        cameras = blueprint.rotation.cameras.len(),
        feeds = blueprint.simulation.feeds.len(),
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting pipeline...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        ticks = stats.ticks,
        rotations = stats.rotations,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed"
    );
    stats.print_summary();
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::GuardBlueprint) {
    let wd = &blueprint.watchdog;
    println!("\n=== Configuration Summary ===\n");
    println!(
        "Watchdog: every {} ms, threshold {:.3}s, immediate publish {}",
        wd.cadence_ms, wd.staleness_threshold_s, wd.immediate_publish
    );
    println!("\nSources ({}):", wd.sources.len());
    for source in &wd.sources {
        println!(
            "  - {} <- {} ({:.3}s)",
            source.name,
            source.topic,
            wd.threshold_secs(source)
        );
    }

    let prox = &blueprint.proximity;
    println!(
        "\nProximity: source {}, < {:.2} m, marker {}",
        prox.source, prox.distance_threshold_m, prox.valid_marker
    );

    let labels: Vec<&str> = blueprint
        .rotation
        .cameras
        .iter()
        .map(|c| c.frame_label.as_str())
        .collect();
    println!("\nRotation: {}", labels.join(" -> "));
    println!("Interrupt topic: {}", blueprint.topics.interrupt);

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }
    println!();
}
