//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::GuardBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

use super::load_blueprint;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    watchdog: WatchdogInfo,
    proximity: ProximityInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cameras: Vec<CameraInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
    interrupt_topic: String,
}

#[derive(Serialize)]
struct WatchdogInfo {
    cadence_ms: u64,
    immediate_publish: bool,
    sources: Vec<SourceInfo>,
}

#[derive(Serialize)]
struct SourceInfo {
    name: String,
    topic: String,
    threshold_s: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    feed_rate_hz: Option<f64>,
}

#[derive(Serialize)]
struct ProximityInfo {
    source: String,
    distance_threshold_m: f32,
    valid_marker: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ignored_sectors: Vec<usize>,
}

#[derive(Serialize)]
struct CameraInfo {
    vbus: u8,
    frame_label: String,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    topics: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");
    let blueprint = load_blueprint(&args.config)?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{json}");
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &GuardBlueprint, args: &InfoArgs) -> ConfigInfo {
    let wd = &blueprint.watchdog;
    let sources = wd
        .sources
        .iter()
        .map(|s| SourceInfo {
            name: s.name.clone(),
            topic: s.topic.clone(),
            threshold_s: wd.threshold_secs(s),
            feed_rate_hz: blueprint
                .simulation
                .feeds
                .iter()
                .find(|f| f.source == s.name)
                .map(|f| f.rate_hz),
        })
        .collect();

    let cameras = if args.cameras {
        blueprint
            .rotation
            .cameras
            .iter()
            .map(|c| CameraInfo {
                vbus: c.vbus,
                frame_label: c.frame_label.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                topics: s.topics.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let prox = &blueprint.proximity;
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        watchdog: WatchdogInfo {
            cadence_ms: wd.cadence_ms,
            immediate_publish: wd.immediate_publish,
            sources,
        },
        proximity: ProximityInfo {
            source: prox.source.clone(),
            distance_threshold_m: prox.distance_threshold_m,
            valid_marker: prox.valid_marker,
            ignored_sectors: prox.ignored_sectors.clone(),
        },
        cameras,
        sinks,
        interrupt_topic: blueprint.topics.interrupt.clone(),
    }
}

fn tree_prefix(index: usize, len: usize) -> &'static str {
    if index + 1 == len {
        "└─"
    } else {
        "├─"
    }
}

fn print_config_info(blueprint: &GuardBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                Motion Guard Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let wd = &blueprint.watchdog;
    println!("⏱  Watchdog");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Cadence: {} ms", wd.cadence_ms);
    println!("   ├─ Immediate publish: {}", wd.immediate_publish);
    println!("   └─ Interrupt topic: {}", blueprint.topics.interrupt);

    println!("\n💓 Heartbeat Sources ({})", wd.sources.len());
    for (i, source) in wd.sources.iter().enumerate() {
        println!(
            "   {} {} <- {} ({:.3}s)",
            tree_prefix(i, wd.sources.len()),
            source.name,
            source.topic,
            wd.threshold_secs(source)
        );
    }

    let prox = &blueprint.proximity;
    println!("\n📏 Proximity");
    println!("   ├─ Source: {}", prox.source);
    println!("   ├─ Threshold: {:.2} m", prox.distance_threshold_m);
    println!("   └─ Valid marker: {}", prox.valid_marker);

    let cameras = &blueprint.rotation.cameras;
    if args.cameras {
        println!("\n📷 Camera Rotation ({})", cameras.len());
        for (i, camera) in cameras.iter().enumerate() {
            println!(
                "   {} vbus {} ({})",
                tree_prefix(i, cameras.len()),
                camera.vbus,
                camera.frame_label
            );
        }
    } else {
        println!("\n📷 Camera Rotation: {} cameras", cameras.len());
    }

    if args.sinks && !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            println!(
                "   {} {} ({:?})",
                tree_prefix(i, blueprint.sinks.len()),
                sink.name,
                sink.sink_type
            );
        }
    }

    println!();
}
