//! RawPayload - what the hardware callback hands over
//!
//! The transport delivers an integer type code plus an opaque, possibly
//! missing, byte buffer. Decoding into typed records is the bridge's job.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Image,
    Imu,
    Ultrasonic,
    Velocity,
    ObstacleDistance,
    Motion,
    /// Code the transport does not document
    Unknown(i32),
}

impl PayloadKind {
    /// Map the transport's type code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Image,
            1 => Self::Imu,
            2 => Self::Ultrasonic,
            3 => Self::Velocity,
            4 => Self::ObstacleDistance,
            5 => Self::Motion,
            other => Self::Unknown(other),
        }
    }

    /// Transport type code
    pub fn code(self) -> i32 {
        match self {
            Self::Image => 0,
            Self::Imu => 1,
            Self::Ultrasonic => 2,
            Self::Velocity => 3,
            Self::ObstacleDistance => 4,
            Self::Motion => 5,
            Self::Unknown(code) => code,
        }
    }

    /// Metric label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Imu => "imu",
            Self::Ultrasonic => "ultrasonic",
            Self::Velocity => "velocity",
            Self::ObstacleDistance => "obstacle_distance",
            Self::Motion => "motion",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown({code})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// One callback delivery
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub kind: PayloadKind,
    /// `None` models a null content pointer
    pub data: Option<Bytes>,
}

impl RawPayload {
    pub fn new(kind: PayloadKind, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            data: Some(data.into()),
        }
    }

    /// Payload with no content
    pub fn empty(kind: PayloadKind) -> Self {
        Self { kind, data: None }
    }

    /// Content length, zero when missing
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Bytes::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
