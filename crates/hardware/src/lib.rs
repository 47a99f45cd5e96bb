//! # Hardware
//!
//! Stereo sensor transport boundary.
//!
//! Responsibilities:
//! - Define the `HardwareTransport` selection/transfer API
//! - Define raw payload layouts and their decoders
//! - Provide `MockGuidance`, an in-process transport with failure injection

pub mod error;
pub mod layout;
pub mod mock_guidance;
pub mod transport;

pub use error::{HardwareError, HardwareOp, Result};
pub use layout::{
    encode_image, DecodeError, ImageChannel, ImageFrame, ObstacleDistanceRaw, UltrasonicRaw,
};
pub use mock_guidance::{FailurePoint, MockGuidance, MockGuidanceConfig, TransportCall};
pub use transport::{DataSelection, HardwareCallback, HardwareTransport, StereoCalibration};
