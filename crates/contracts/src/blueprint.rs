//! GuardBlueprint - Config Loader 输出
//!
//! Complete startup configuration: watched heartbeat sources, proximity
//! filter, camera rotation, bridge topics, simulation feeds and sink routing.
//! Nothing here is re-read after startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

use crate::{CameraDescriptor, ContractError, VbusIndex};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GuardBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// Freshness watchdog
    #[serde(default)]
    #[validate(nested)]
    pub watchdog: WatchdogConfig,

    /// Short-range obstacle check
    #[serde(default)]
    #[validate(nested)]
    pub proximity: ProximityConfig,

    /// Camera rotation
    #[serde(default)]
    #[validate(nested)]
    pub rotation: RotationConfig,

    /// Acquisition bridge behaviour
    #[serde(default)]
    #[validate(nested)]
    pub bridge: BridgeConfig,

    /// Output topics of the bridge and the watchdog
    #[serde(default)]
    #[validate(nested)]
    pub topics: TopicConfig,

    /// Reference hardware and simulated heartbeat feeds
    #[serde(default)]
    #[validate(nested)]
    pub simulation: SimulationConfig,

    /// 输出路由配置
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

// ===== Watchdog =====

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WatchdogConfig {
    /// Evaluation period (ms)
    #[serde(default = "default_cadence_ms")]
    #[validate(range(min = 1))]
    pub cadence_ms: u64,

    /// Shared staleness threshold (s)
    #[serde(default = "default_staleness_threshold")]
    #[validate(range(exclusive_min = 0.0))]
    pub staleness_threshold_s: f64,

    /// Publish PROXIMITY straight from the subscriber as well as on the next tick
    #[serde(default = "default_true")]
    pub immediate_publish: bool,

    /// Monitored heartbeat sources
    #[serde(default = "default_sources")]
    #[validate(length(min = 1), nested)]
    pub sources: Vec<HeartbeatSourceConfig>,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            cadence_ms: default_cadence_ms(),
            staleness_threshold_s: default_staleness_threshold(),
            immediate_publish: true,
            sources: default_sources(),
        }
    }
}

impl WatchdogConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }

    /// Threshold for a source in seconds, falling back to the shared value
    pub fn threshold_secs(&self, source: &HeartbeatSourceConfig) -> f64 {
        source.threshold_s.unwrap_or(self.staleness_threshold_s)
    }

    /// Threshold for a source; NaN, infinite or huge values are rejected
    pub fn threshold_for(&self, source: &HeartbeatSourceConfig) -> Result<Duration, ContractError> {
        let field = match source.threshold_s {
            Some(_) => format!("watchdog.sources.{}.threshold_s", source.name),
            None => "watchdog.staleness_threshold_s".to_string(),
        };
        duration_from_secs(field, self.threshold_secs(source))
    }
}

/// Float seconds to `Duration` without panicking
///
/// Negative, NaN and out-of-range values become a validation error on `field`.
pub fn duration_from_secs(field: impl Into<String>, secs: f64) -> Result<Duration, ContractError> {
    Duration::try_from_secs_f64(secs).map_err(|e| {
        ContractError::config_validation(field, format!("{secs} s is not a usable duration: {e}"))
    })
}

/// Tick period of a rate in Hz; the period must be non-zero
pub fn period_from_hz(field: impl Into<String>, hz: f64) -> Result<Duration, ContractError> {
    let field = field.into();
    let period = duration_from_secs(field.clone(), 1.0 / hz)?;
    if period.is_zero() {
        return Err(ContractError::config_validation(
            field,
            format!("{hz} Hz is too fast for a timer"),
        ));
    }
    Ok(period)
}

/// One watched source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HeartbeatSourceConfig {
    #[validate(length(min = 1))]
    pub name: String,

    /// Bus topic whose arrivals count as heartbeats
    #[validate(length(min = 1))]
    pub topic: String,

    /// Per-source override of `staleness_threshold_s`
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub threshold_s: Option<f64>,
}

impl HeartbeatSourceConfig {
    pub fn new(name: &str, topic: &str) -> Self {
        Self {
            name: name.to_string(),
            topic: topic.to_string(),
            threshold_s: None,
        }
    }
}

fn default_cadence_ms() -> u64 {
    50
}

fn default_staleness_threshold() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

fn default_sources() -> Vec<HeartbeatSourceConfig> {
    vec![
        HeartbeatSourceConfig::new("ultrasonic", "uav_nav/guidance/ultrasonic"),
        HeartbeatSourceConfig::new("laser_scan", "uav_nav/guidance/laser_scan_from_depthIMG"),
        HeartbeatSourceConfig::new("attitude", "uav_nav/roll_pitch_yaw"),
        HeartbeatSourceConfig::new("local_position", "dji_sdk/local_position"),
        HeartbeatSourceConfig::new("velocity", "dji_sdk/velocity"),
        HeartbeatSourceConfig::new("vel_cmd", "uav_nav/vel_cmd"),
    ]
}

// ===== Proximity =====

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProximityConfig {
    /// Heartbeat source whose scans are inspected
    #[serde(default = "default_proximity_source")]
    #[validate(length(min = 1))]
    pub source: String,

    /// Sector range below which an obstacle is imminent (m)
    #[serde(default = "default_distance_threshold")]
    #[validate(range(exclusive_min = 0.0))]
    pub distance_threshold_m: f32,

    /// Intensity value marking a reliable sector
    #[serde(default = "default_valid_marker")]
    pub valid_marker: f32,

    /// Sector indices never inspected
    #[serde(default)]
    pub ignored_sectors: Vec<usize>,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            source: default_proximity_source(),
            distance_threshold_m: default_distance_threshold(),
            valid_marker: default_valid_marker(),
            ignored_sectors: Vec::new(),
        }
    }
}

fn default_proximity_source() -> String {
    "ultrasonic".to_string()
}

fn default_distance_threshold() -> f32 {
    2.0
}

fn default_valid_marker() -> f32 {
    1.0
}

// ===== Rotation =====

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RotationConfig {
    /// Fixed rotation order
    #[serde(default = "default_cameras")]
    #[validate(length(min = 1), nested)]
    pub cameras: Vec<CameraConfig>,

    /// Pause after re-arming acquisition (ms)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Wait between stop and release at shutdown (ms)
    #[serde(default = "default_release_ack_delay_ms")]
    pub release_ack_delay_ms: u64,

    /// Fatal timeout on the cycle-ready wait; unbounded when absent
    #[serde(default)]
    #[validate(range(min = 1))]
    pub cycle_timeout_ms: Option<u64>,

    /// Also select the depth channel of each camera
    #[serde(default)]
    pub select_depth: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            cameras: default_cameras(),
            settle_delay_ms: default_settle_delay_ms(),
            release_ack_delay_ms: default_release_ack_delay_ms(),
            cycle_timeout_ms: None,
            select_depth: false,
        }
    }
}

impl RotationConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn release_ack_delay(&self) -> Duration {
        Duration::from_millis(self.release_ack_delay_ms)
    }

    pub fn cycle_timeout(&self) -> Option<Duration> {
        self.cycle_timeout_ms.map(Duration::from_millis)
    }

    /// Typed rotation list
    pub fn descriptors(&self) -> Result<Vec<CameraDescriptor>, ContractError> {
        self.cameras
            .iter()
            .map(|c| Ok(CameraDescriptor::new(VbusIndex::new(c.vbus)?, &c.frame_label)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CameraConfig {
    /// 1-based camera pair
    #[validate(range(min = 1, max = 5))]
    pub vbus: u8,

    #[validate(length(min = 1))]
    pub frame_label: String,
}

fn default_cameras() -> Vec<CameraConfig> {
    ["front", "right", "rear", "left", "down"]
        .iter()
        .zip(1u8..)
        .map(|(label, vbus)| CameraConfig {
            vbus,
            frame_label: (*label).to_string(),
        })
        .collect()
}

fn default_settle_delay_ms() -> u64 {
    53
}

fn default_release_ack_delay_ms() -> u64 {
    1000
}

// ===== Bridge / topics =====

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BridgeConfig {
    /// Log every decoded reading at debug level
    #[serde(default)]
    pub show_info: bool,

    /// Capacity of the publish bus
    #[serde(default = "default_bus_capacity")]
    #[validate(range(min = 1))]
    pub bus_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            show_info: false,
            bus_capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TopicConfig {
    #[serde(default = "default_left_topic")]
    #[validate(length(min = 1))]
    pub left_image: String,

    #[serde(default = "default_right_topic")]
    #[validate(length(min = 1))]
    pub right_image: String,

    #[serde(default = "default_obstacle_topic")]
    #[validate(length(min = 1))]
    pub obstacle_distance: String,

    #[serde(default = "default_ultrasonic_topic")]
    #[validate(length(min = 1))]
    pub ultrasonic: String,

    /// Depth frames are only published when set
    #[serde(default)]
    #[validate(length(min = 1))]
    pub depth_image: Option<String>,

    #[serde(default = "default_interrupt_topic")]
    #[validate(length(min = 1))]
    pub interrupt: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            left_image: default_left_topic(),
            right_image: default_right_topic(),
            obstacle_distance: default_obstacle_topic(),
            ultrasonic: default_ultrasonic_topic(),
            depth_image: None,
            interrupt: default_interrupt_topic(),
        }
    }
}

fn default_left_topic() -> String {
    "uav_nav/guidance/left_image".to_string()
}

fn default_right_topic() -> String {
    "uav_nav/guidance/right_image".to_string()
}

fn default_obstacle_topic() -> String {
    "uav_nav/guidance/obstacle_distance".to_string()
}

fn default_ultrasonic_topic() -> String {
    "uav_nav/guidance/ultrasonic".to_string()
}

fn default_interrupt_topic() -> String {
    "uav_nav/signal_interrupt".to_string()
}

// ===== Simulation =====

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SimulationConfig {
    /// Mock hardware payload rate per kind (Hz)
    #[serde(default = "default_hardware_rate")]
    #[validate(range(exclusive_min = 0.0))]
    pub hardware_rate_hz: f64,

    /// Obstacle distance reported by the mock hardware (cm)
    #[serde(default = "default_mock_obstacle_cm")]
    pub obstacle_distance_cm: u16,

    /// Ultrasonic distance reported by the mock hardware (mm)
    #[serde(default = "default_mock_ultrasonic_mm")]
    pub ultrasonic_mm: i16,

    /// Simulated publishers for the sources not fed by the bridge
    #[serde(default)]
    #[validate(nested)]
    pub feeds: Vec<FeedConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            hardware_rate_hz: default_hardware_rate(),
            obstacle_distance_cm: default_mock_obstacle_cm(),
            ultrasonic_mm: default_mock_ultrasonic_mm(),
            feeds: Vec::new(),
        }
    }
}

/// A simulated heartbeat publisher
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeedConfig {
    /// Name of the heartbeat source this feed publishes for
    #[validate(length(min = 1))]
    pub source: String,

    #[validate(range(exclusive_min = 0.0))]
    pub rate_hz: f64,

    /// Stop publishing after this many seconds (simulates a lost feed)
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub silent_after_s: Option<f64>,
}

fn default_hardware_rate() -> f64 {
    20.0
}

fn default_mock_obstacle_cm() -> u16 {
    500
}

fn default_mock_ultrasonic_mm() -> i16 {
    3000
}

// ===== Sinks =====

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink 名称
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,

    /// Only these topics reach the sink; all topics when empty
    #[serde(default)]
    pub topics: Vec<String>,
}

impl SinkConfig {
    pub fn accepts(&self, topic: &str) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| t == topic)
    }
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出
    File,
    /// 网络输出 (UDP)
    Network,
}

impl GuardBlueprint {
    /// Topic a source listens on
    pub fn source_topic(&self, name: &str) -> Option<&str> {
        self.watchdog
            .sources
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.topic.as_str())
    }
}

impl Default for GuardBlueprint {
    fn default() -> Self {
        Self {
            version: ConfigVersion::V1,
            watchdog: WatchdogConfig::default(),
            proximity: ProximityConfig::default(),
            rotation: RotationConfig::default(),
            bridge: BridgeConfig::default(),
            topics: TopicConfig::default(),
            simulation: SimulationConfig::default(),
            sinks: Vec::new(),
        }
    }
}
