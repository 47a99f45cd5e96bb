//! InterruptLevel - the aggregated safety signal

use serde::{Deserialize, Serialize};
use std::fmt;

/// Motion-gating interrupt level, published downstream as a single `u8`.
///
/// Variants are ordered by precedence: `Proximity` beats `Stale` beats
/// `Clear`, so combining two levels is `max`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum InterruptLevel {
    /// All sources fresh, no obstacle
    #[default]
    Clear = 0,
    /// At least one heartbeat source exceeded its staleness threshold
    Stale = 1,
    /// Short-range sensor reported an imminent obstacle
    Proximity = 2,
}

impl InterruptLevel {
    /// Wire value
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a wire value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Clear),
            1 => Some(Self::Stale),
            2 => Some(Self::Proximity),
            _ => None,
        }
    }

    /// Whether motion must be interrupted
    pub fn is_interrupt(self) -> bool {
        self != Self::Clear
    }

    /// Lower-case label used in logs and metric labels
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Stale => "stale",
            Self::Proximity => "proximity",
        }
    }
}

impl fmt::Display for InterruptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
