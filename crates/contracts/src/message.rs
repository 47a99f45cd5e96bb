//! Downstream message schema
//!
//! Everything that travels over the publish bus: republished imagery and
//! ranges from the bridge, heartbeat traffic from the rest of the robot, and
//! the interrupt level itself.

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::InterruptLevel;

/// Message header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Frame label of the producing camera / subsystem
    pub frame_id: String,

    /// Wall-clock time (seconds since UNIX epoch)
    pub stamp: f64,
}

impl Header {
    /// Header stamped with the current wall-clock time
    pub fn now(frame_id: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.into(),
            stamp: wall_clock_secs(),
        }
    }
}

/// Current wall-clock time as fractional seconds
pub fn wall_clock_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// 像素编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageEncoding {
    /// 8-bit greyscale
    Mono8,
    /// 16-bit depth, little endian
    Mono16,
}

impl ImageEncoding {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Mono8 => 1,
            Self::Mono16 => 2,
        }
    }
}

/// Single-channel image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMessage {
    pub header: Header,
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
    /// Row-major pixel data (zero-copy)
    pub data: Bytes,
}

/// Per-sector ranges (metres) with optional per-sector intensities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeScan {
    pub header: Header,
    pub ranges: Vec<f32>,
    #[serde(default)]
    pub intensities: Vec<f32>,
}

impl RangeScan {
    /// `(range, validity)` pairs; a missing intensity reads as `0.0`
    pub fn sectors(&self) -> impl Iterator<Item = (usize, f32, f32)> + '_ {
        self.ranges.iter().enumerate().map(|(i, &range)| {
            let validity = self.intensities.get(i).copied().unwrap_or(0.0);
            (i, range, validity)
        })
    }
}

/// Attitude / velocity triple
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector3Stamped {
    pub header: Header,
    pub vector: Vector3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointStamped {
    pub header: Header,
    pub point: Vector3,
}

/// Motion command (joystick-style axes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoyCommand {
    pub header: Header,
    pub axes: Vec<f32>,
    #[serde(default)]
    pub buttons: Vec<i32>,
}

/// Interrupt level output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterruptMessage {
    pub level: InterruptLevel,
    pub stamp: f64,
}

impl InterruptMessage {
    pub fn now(level: InterruptLevel) -> Self {
        Self {
            level,
            stamp: wall_clock_secs(),
        }
    }

    /// Wire value (0 / 1 / 2)
    pub fn data(&self) -> u8 {
        self.level.as_u8()
    }
}

/// Any bus message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Image(ImageMessage),
    Range(RangeScan),
    Vector3(Vector3Stamped),
    Point(PointStamped),
    Joy(JoyCommand),
    Interrupt(InterruptMessage),
}

impl Message {
    /// Short type label for logs and file names
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Range(_) => "range",
            Self::Vector3(_) => "vector3",
            Self::Point(_) => "point",
            Self::Joy(_) => "joy",
            Self::Interrupt(_) => "interrupt",
        }
    }

    pub fn header(&self) -> Option<&Header> {
        match self {
            Self::Image(m) => Some(&m.header),
            Self::Range(m) => Some(&m.header),
            Self::Vector3(m) => Some(&m.header),
            Self::Point(m) => Some(&m.header),
            Self::Joy(m) => Some(&m.header),
            Self::Interrupt(_) => None,
        }
    }
}

/// Message addressed to a topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub message: Message,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, message: Message) -> Self {
        Self {
            topic: topic.into(),
            message,
        }
    }
}
