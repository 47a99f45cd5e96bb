//! # Contracts
//!
//! Frozen interface contracts shared by every motion-guard crate: payloads
//! delivered by the sensor hardware, the downstream message schema, the
//! interrupt level, and the configuration blueprint.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Freshness is measured on the monotonic clock (`tokio::time::Instant`)
//! - Message headers carry wall-clock seconds (f64) for downstream consumers

mod blueprint;
mod camera;
mod error;
mod interrupt;
mod message;
mod payload;
mod publish;
mod sink;
mod source_id;

pub use blueprint::*;
pub use camera::*;
pub use error::*;
pub use interrupt::InterruptLevel;
pub use message::*;
pub use payload::{PayloadKind, RawPayload};
pub use publish::{Publisher, SharedPublisher};
pub use sink::*;
pub use source_id::SourceId;
