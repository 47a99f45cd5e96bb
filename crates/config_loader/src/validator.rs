//! 配置校验模块
//!
//! Field-level rules (ranges, non-empty strings and lists) are declared with
//! `validator` derives on the blueprint. Cross-field rules live here:
//! - heartbeat source names and topics unique
//! - proximity source is a watched source
//! - camera frame labels unique
//! - simulated feeds reference watched sources
//! - sink names unique
//! - every threshold and rate converts to a finite timer period

use std::collections::HashSet;

use contracts::{duration_from_secs, period_from_hz, ContractError, GuardBlueprint};
use ::validator::Validate;

/// 校验 GuardBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &GuardBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_timing(blueprint)?;
    validate_sources(blueprint)?;
    validate_proximity(blueprint)?;
    validate_cameras(blueprint)?;
    validate_feeds(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// Derive-declared field rules
fn validate_fields(blueprint: &GuardBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "blueprint".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

/// Range rules let NaN and infinity through; the timers would panic on them
fn validate_timing(blueprint: &GuardBlueprint) -> Result<(), ContractError> {
    let watchdog = &blueprint.watchdog;
    duration_from_secs("watchdog.staleness_threshold_s", watchdog.staleness_threshold_s)?;
    for (idx, source) in watchdog.sources.iter().enumerate() {
        if let Some(secs) = source.threshold_s {
            duration_from_secs(format!("watchdog.sources[{idx}].threshold_s"), secs)?;
        }
    }

    let simulation = &blueprint.simulation;
    period_from_hz("simulation.hardware_rate_hz", simulation.hardware_rate_hz)?;
    for (idx, feed) in simulation.feeds.iter().enumerate() {
        period_from_hz(format!("simulation.feeds[{idx}].rate_hz"), feed.rate_hz)?;
        if let Some(secs) = feed.silent_after_s {
            duration_from_secs(format!("simulation.feeds[{idx}].silent_after_s"), secs)?;
        }
    }
    Ok(())
}

/// 校验 source 名称与 topic 唯一性
fn validate_sources(blueprint: &GuardBlueprint) -> Result<(), ContractError> {
    let mut names = HashSet::new();
    let mut topics = HashSet::new();
    for (idx, source) in blueprint.watchdog.sources.iter().enumerate() {
        if !names.insert(source.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("watchdog.sources[{idx}].name"),
                format!("duplicate source name '{}'", source.name),
            ));
        }
        if !topics.insert(source.topic.as_str()) {
            return Err(ContractError::config_validation(
                format!("watchdog.sources[{idx}].topic"),
                format!("duplicate source topic '{}'", source.topic),
            ));
        }
    }
    Ok(())
}

fn validate_proximity(blueprint: &GuardBlueprint) -> Result<(), ContractError> {
    let source = &blueprint.proximity.source;
    if blueprint.source_topic(source).is_none() {
        return Err(ContractError::config_validation(
            "proximity.source",
            format!("'{source}' is not a watched heartbeat source"),
        ));
    }
    Ok(())
}

/// 校验相机列表
fn validate_cameras(blueprint: &GuardBlueprint) -> Result<(), ContractError> {
    let mut labels = HashSet::new();
    for (idx, camera) in blueprint.rotation.cameras.iter().enumerate() {
        if !labels.insert(camera.frame_label.as_str()) {
            return Err(ContractError::config_validation(
                format!("rotation.cameras[{idx}].frame_label"),
                format!("duplicate frame label '{}'", camera.frame_label),
            ));
        }
    }
    // vbus range is a derive rule; re-check through the typed constructor
    blueprint.rotation.descriptors().map(|_| ())
}

fn validate_feeds(blueprint: &GuardBlueprint) -> Result<(), ContractError> {
    for (idx, feed) in blueprint.simulation.feeds.iter().enumerate() {
        if blueprint.source_topic(&feed.source).is_none() {
            return Err(ContractError::config_validation(
                format!("simulation.feeds[{idx}].source"),
                format!("'{}' is not a watched heartbeat source", feed.source),
            ));
        }
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &GuardBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
    }
    Ok(())
}
