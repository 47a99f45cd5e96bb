//! # Acquisition
//!
//! Camera rotation and hardware callback dispatch.
//!
//! Responsibilities:
//! - Decode hardware payloads and republish them in the downstream schema
//! - Guard the shared image scratch buffers
//! - Signal cycle completion to the rotation loop
//! - Cycle the transport through the configured cameras
//!
//! ## Usage Example
//!
//! ```ignore
//! use acquisition::{AcquisitionBridge, RotationController, RotationSettings, Scratch};
//!
//! let scratch = Arc::new(Scratch::new(cameras[0].clone()));
//! let bridge = Arc::new(AcquisitionBridge::new(publisher, topics, false, scratch.clone()));
//!
//! let mut rotation = RotationController::new(
//!     transport,
//!     cameras,
//!     scratch,
//!     bridge.cycle().clone(),
//!     RotationSettings::from_config(&blueprint.rotation),
//! )?;
//! rotation.start(bridge.callback())?;
//! rotation.run_until(shutdown).await?;
//! rotation.shutdown().await?;
//! ```

mod bridge;
mod config;
mod cycle;
mod error;
mod rotation;
mod scratch;

// Re-exports
pub use bridge::AcquisitionBridge;
pub use config::{BridgeMetrics, BridgeSnapshot};
pub use cycle::CycleSignal;
pub use error::{AcquisitionError, Result};
pub use rotation::{RotationController, RotationPhase, RotationSettings};
pub use scratch::{Scratch, ScratchBuffers};
