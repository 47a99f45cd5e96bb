//! 相机描述 - rotation 的基本单元
//!
//! The rig carries five stereo pairs addressed by bus index `1..=5`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ContractError;

/// Number of stereo pairs on the rig
pub const CAMERA_PAIR_COUNT: usize = 5;

/// Greyscale frame width (pixels)
pub const IMAGE_WIDTH: u32 = 320;

/// Greyscale frame height (pixels)
pub const IMAGE_HEIGHT: u32 = 240;

/// Pixels per frame
pub const IMAGE_PIXELS: usize = (IMAGE_WIDTH * IMAGE_HEIGHT) as usize;

/// Camera-pair bus index, always within `1..=CAMERA_PAIR_COUNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct VbusIndex(u8);

impl VbusIndex {
    /// Build from a 1-based bus number
    pub fn new(vbus: u8) -> Result<Self, ContractError> {
        if (1..=CAMERA_PAIR_COUNT as u8).contains(&vbus) {
            Ok(Self(vbus))
        } else {
            Err(ContractError::config_validation(
                "vbus",
                format!("must be within 1..={CAMERA_PAIR_COUNT}, got {vbus}"),
            ))
        }
    }

    /// 1-based bus number
    pub fn get(self) -> u8 {
        self.0
    }

    /// 0-based slot into per-pair arrays delivered by the hardware
    pub fn slot(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for VbusIndex {
    type Error = ContractError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VbusIndex> for u8 {
    fn from(v: VbusIndex) -> Self {
        v.0
    }
}

impl fmt::Display for VbusIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vbus{}", self.0)
    }
}

/// One entry of the rotation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    pub vbus: VbusIndex,
    /// Frame label stamped on every republished message (`"front"`, ...)
    pub frame_label: String,
}

impl CameraDescriptor {
    pub fn new(vbus: VbusIndex, frame_label: impl Into<String>) -> Self {
        Self {
            vbus,
            frame_label: frame_label.into(),
        }
    }
}

/// Snapshot of the rotation position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationState {
    /// Index into the fixed camera list
    pub active_index: usize,
    pub frame_label: String,
}
