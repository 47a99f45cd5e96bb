//! LogSink - logs a one-line summary of every message via tracing

use contracts::{ContractError, DataSink, Envelope, Message};
use tracing::{debug, info, instrument};

/// Sink that logs message summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_summary(&self, envelope: &Envelope) {
        let topic = envelope.topic.as_str();
        match &envelope.message {
            Message::Interrupt(msg) => {
                info!(sink = %self.name, topic, level = %msg.level, data = msg.data(), "interrupt");
            }
            Message::Image(img) => {
                debug!(
                    sink = %self.name,
                    topic,
                    frame = %img.header.frame_id,
                    width = img.width,
                    height = img.height,
                    bytes = img.data.len(),
                    "image"
                );
            }
            Message::Range(scan) => {
                debug!(
                    sink = %self.name,
                    topic,
                    frame = %scan.header.frame_id,
                    ranges = ?scan.ranges,
                    "range scan"
                );
            }
            other => {
                debug!(sink = %self.name, topic, kind = other.kind(), "message");
            }
        }
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        level = "trace",
        name = "log_sink_write",
        skip(self, envelope),
        fields(sink = %self.name, topic = %envelope.topic)
    )]
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        self.log_summary(envelope);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
