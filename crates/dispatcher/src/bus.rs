//! In-process publish bus
//!
//! Bounded `async-channel` of envelopes. Publishing never blocks: a full
//! queue drops the message and counts it, so the hardware callback thread is
//! never stalled by a slow consumer.

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{ContractError, Envelope, Publisher};
use tracing::{trace, warn};

use crate::metrics::BusMetrics;

/// Sending half of the bus
#[derive(Debug, Clone)]
pub struct BusPublisher {
    tx: Sender<Envelope>,
    metrics: Arc<BusMetrics>,
}

/// Create a bus with room for `capacity` pending envelopes
pub fn bus(capacity: usize) -> (BusPublisher, Receiver<Envelope>) {
    let (tx, rx) = bounded(capacity.max(1));
    let publisher = BusPublisher {
        tx,
        metrics: Arc::new(BusMetrics::default()),
    };
    (publisher, rx)
}

impl BusPublisher {
    pub fn metrics(&self) -> &Arc<BusMetrics> {
        &self.metrics
    }

    /// Stop accepting envelopes; receivers drain what is queued
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Publisher for BusPublisher {
    fn publish(&self, envelope: Envelope) -> Result<(), ContractError> {
        match self.tx.try_send(envelope) {
            Ok(()) => {
                self.metrics.record_accepted();
                Ok(())
            }
            Err(TrySendError::Full(envelope)) => {
                self.metrics.record_dropped();
                observability::record_publish_dropped(&envelope.topic);
                trace!(topic = %envelope.topic, "bus full, message dropped");
                Err(ContractError::PublishQueueFull {
                    topic: envelope.topic,
                })
            }
            Err(TrySendError::Closed(envelope)) => {
                warn!(topic = %envelope.topic, "bus closed");
                Err(ContractError::PublishClosed {
                    topic: envelope.topic,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{InterruptLevel, InterruptMessage, Message};

    fn interrupt() -> Envelope {
        Envelope::new(
            "uav_nav/signal_interrupt",
            Message::Interrupt(InterruptMessage::now(InterruptLevel::Clear)),
        )
    }

    #[test]
    fn test_full_bus_drops_without_blocking() {
        let (publisher, rx) = bus(2);
        assert!(publisher.publish(interrupt()).is_ok());
        assert!(publisher.publish(interrupt()).is_ok());
        let err = publisher.publish(interrupt()).unwrap_err();
        assert!(matches!(err, ContractError::PublishQueueFull { .. }));
        assert_eq!(publisher.metrics().counts(), (2, 1));
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn test_closed_bus_rejects() {
        let (publisher, rx) = bus(4);
        drop(rx);
        let err = publisher.publish(interrupt()).unwrap_err();
        assert!(matches!(err, ContractError::PublishClosed { .. }));
    }

    #[tokio::test]
    async fn test_close_lets_receiver_drain() {
        let (publisher, rx) = bus(4);
        publisher.publish(interrupt()).unwrap();
        assert!(publisher.close());
        assert!(publisher.publish(interrupt()).is_err());
        assert!(rx.recv().await.is_ok());
        assert!(rx.recv().await.is_err());
    }
}
