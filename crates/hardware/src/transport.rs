//! Hardware transport abstraction
//!
//! Models the stereo-camera sensor SDK: a selection API deciding which
//! channels the next transfer carries, transfer start/stop/release, and a
//! single callback receiving every payload.

use std::sync::Arc;

use contracts::{RawPayload, VbusIndex, CAMERA_PAIR_COUNT};
use serde::Serialize;

use crate::error::Result;

/// Payload callback installed on the transport
///
/// Invoked from a transport-owned thread. Deliveries are serialized, with no
/// ordering guarantee across payload kinds.
pub type HardwareCallback = Arc<dyn Fn(RawPayload) + Send + Sync>;

/// Channels requested for the next transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSelection {
    /// Camera pair the image channels come from
    pub vbus: VbusIndex,
    pub greyscale_left: bool,
    pub greyscale_right: bool,
    pub depth: bool,
    pub ultrasonic: bool,
    pub obstacle_distance: bool,
}

impl DataSelection {
    /// Both greyscale sides plus ultrasonic and obstacle distance
    pub fn for_camera(vbus: VbusIndex, depth: bool) -> Self {
        Self {
            vbus,
            greyscale_left: true,
            greyscale_right: true,
            depth,
            ultrasonic: true,
            obstacle_distance: true,
        }
    }
}

/// Intrinsics of one stereo pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StereoCalibration {
    /// Principal point x
    pub cu: f32,
    /// Principal point y
    pub cv: f32,
    pub focal: f32,
    /// Baseline (m)
    pub baseline: f32,
}

/// Sensor transport
///
/// Calls are synchronous and short. Any `Err` is fatal for acquisition: the
/// caller must not resume a transfer against a partially applied selection.
pub trait HardwareTransport: Send + Sync {
    /// Replace the current selection (implies a reset of the previous one)
    fn configure(&self, selection: &DataSelection) -> Result<()>;

    /// Begin delivering payloads for the current selection
    fn start(&self) -> Result<()>;

    /// Stop delivering payloads
    fn stop(&self) -> Result<()>;

    /// Release the transport; no further calls are valid
    fn release(&self) -> Result<()>;

    /// Install the dispatch entry point, replacing any previous one
    fn register_callback(&self, callback: HardwareCallback) -> Result<()>;

    /// Which camera pairs are connected
    fn online_status(&self) -> Result<[bool; CAMERA_PAIR_COUNT]>;

    /// Per-pair stereo calibration
    fn stereo_calibration(&self) -> Result<[StereoCalibration; CAMERA_PAIR_COUNT]>;
}
