//! Publisher trait - outbound side of the publish/subscribe transport
//!
//! Callers include the hardware callback thread, so `publish` must never
//! block: a transport that cannot accept the message drops it and accounts
//! for the drop itself.

use std::sync::Arc;

use crate::{ContractError, Envelope};

/// Non-blocking message publisher
///
/// # Example
///
/// ```ignore
/// let publisher: SharedPublisher = bus.publisher();
/// if let Err(e) = publisher.publish(envelope) {
///     tracing::trace!(error = %e, "message dropped");
/// }
/// ```
pub trait Publisher: Send + Sync {
    /// Hand a message to the transport
    ///
    /// # Errors
    /// - `PublishQueueFull` when the bounded queue is full (message dropped)
    /// - `PublishClosed` when the transport has shut down
    fn publish(&self, envelope: Envelope) -> Result<(), ContractError>;
}

/// Shared publisher handle
pub type SharedPublisher = Arc<dyn Publisher>;

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    fn publish(&self, envelope: Envelope) -> Result<(), ContractError> {
        (**self).publish(envelope)
    }
}
