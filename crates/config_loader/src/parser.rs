//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。Missing sections fall back to
//! serde defaults.

use contracts::{ContractError, GuardBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<GuardBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<GuardBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<GuardBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[watchdog]
cadence_ms = 100
staleness_threshold_s = 0.5

[[watchdog.sources]]
name = "velocity"
topic = "dji_sdk/velocity"

[[watchdog.sources]]
name = "ultrasonic"
topic = "uav_nav/guidance/ultrasonic"
threshold_s = 1.0

[[rotation.cameras]]
vbus = 1
frame_label = "front"

[[rotation.cameras]]
vbus = 5
frame_label = "down"

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.watchdog.cadence_ms, 100);
        assert_eq!(bp.watchdog.sources.len(), 2);
        assert_eq!(bp.watchdog.sources[1].threshold_s, Some(1.0));
        assert_eq!(bp.rotation.cameras.len(), 2);
        assert_eq!(bp.rotation.settle_delay_ms, 53);
        assert_eq!(bp.proximity.source, "ultrasonic");
    }

    #[test]
    fn test_parse_empty_toml_uses_defaults() {
        let bp = parse_toml("").unwrap();
        assert_eq!(bp.watchdog.sources.len(), 6);
        assert_eq!(bp.rotation.cameras.len(), 5);
        assert_eq!(bp.topics.interrupt, "uav_nav/signal_interrupt");
        assert!(bp.sinks.is_empty());
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "watchdog": {
                "sources": [{ "name": "vel_cmd", "topic": "uav_nav/vel_cmd" }]
            },
            "proximity": { "source": "vel_cmd", "distance_threshold_m": 1.5 },
            "sinks": [{ "name": "log", "sink_type": "log", "topics": ["uav_nav/signal_interrupt"] }]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.proximity.distance_threshold_m, 1.5);
        assert_eq!(bp.sinks[0].topics.len(), 1);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_rejects_out_of_range_vbus_type() {
        let content = r#"
[[rotation.cameras]]
vbus = 300
frame_label = "front"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
