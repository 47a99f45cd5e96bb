//! ChannelSink - forwards envelopes to an in-process receiver

use contracts::{ContractError, DataSink, Envelope};
use tokio::sync::mpsc;

/// Subscription endpoint; the receiver sees the sink's filtered topics
pub struct ChannelSink {
    name: String,
    tx: mpsc::Sender<Envelope>,
}

impl ChannelSink {
    pub fn new(name: impl Into<String>, tx: mpsc::Sender<Envelope>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }
}

impl DataSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        self.tx
            .send(envelope.clone())
            .await
            .map_err(|_| ContractError::sink_write(&self.name, "subscriber dropped"))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
