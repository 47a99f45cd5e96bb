//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::GuardBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::CliError;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    source_count: usize,
    camera_count: usize,
    feed_count: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    match result.error {
        None => Ok(()),
        Some(message) => Err(CliError::config_validation(message).into()),
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            error: Some(format!("File not found: {config_path}")),
            config_path,
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(ConfigSummary {
                version: format!("{:?}", blueprint.version),
                source_count: blueprint.watchdog.sources.len(),
                camera_count: blueprint.rotation.cameras.len(),
                feed_count: blueprint.simulation.feeds.len(),
                sink_count: blueprint.sinks.len(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Non-fatal issues
fn collect_warnings(blueprint: &GuardBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - only the watchdog consumes the bus".to_string());
    }

    let cadence = blueprint.watchdog.cadence();
    for source in &blueprint.watchdog.sources {
        if blueprint
            .watchdog
            .threshold_for(source)
            .is_ok_and(|threshold| threshold < cadence)
        {
            warnings.push(format!(
                "Source '{}' threshold is shorter than the {} ms evaluation cadence",
                source.name, blueprint.watchdog.cadence_ms
            ));
        }
    }

    // bridge-fed sources get heartbeats from the mock sensor, the rest need a feed
    let bridged = [
        blueprint.topics.ultrasonic.as_str(),
        blueprint.topics.obstacle_distance.as_str(),
        blueprint.topics.left_image.as_str(),
        blueprint.topics.right_image.as_str(),
    ];
    for source in &blueprint.watchdog.sources {
        let fed = blueprint
            .simulation
            .feeds
            .iter()
            .any(|f| f.source == source.name);
        if !fed && !bridged.contains(&source.topic.as_str()) {
            warnings.push(format!(
                "Source '{}' has no simulated feed and will go stale in `run`",
                source.name
            ));
        }
    }

    if !blueprint.proximity.ignored_sectors.is_empty() {
        warnings.push(format!(
            "Proximity ignores sectors {:?}",
            blueprint.proximity.ignored_sectors
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Heartbeat sources: {}", summary.source_count);
            println!("  Cameras: {}", summary.camera_count);
            println!("  Simulated feeds: {}", summary.feed_count);
            println!("  Sinks: {}", summary.sink_count);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}
