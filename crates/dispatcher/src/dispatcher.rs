//! Dispatcher - fans bus envelopes out to sinks

use async_channel::Receiver;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{Envelope, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::SinkSnapshot;
use crate::sinks::{ChannelSink, FileSink, LogSink, NetworkSink};

/// Builder for a Dispatcher
pub struct DispatcherBuilder {
    sinks: Vec<SinkConfig>,
    handles: Vec<SinkHandle>,
    input_rx: Receiver<Envelope>,
}

impl DispatcherBuilder {
    pub fn new(sinks: Vec<SinkConfig>, input_rx: Receiver<Envelope>) -> Self {
        Self {
            sinks,
            handles: Vec::new(),
            input_rx,
        }
    }

    /// Add an in-process subscriber limited to `topics`
    ///
    /// The receiver closes once the dispatcher shuts down.
    pub fn subscribe(
        &mut self,
        name: impl Into<String>,
        topics: Vec<String>,
        capacity: usize,
    ) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = ChannelSink::new(name, tx);
        self.handles
            .push(SinkHandle::spawn_filtered(sink, capacity, topics));
        rx
    }

    #[instrument(name = "dispatcher_builder_build", skip(self), fields(sink_count = self.sinks.len()))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut handles = self.handles;
        for config in &self.sinks {
            handles.push(create_sink_handle(config).await?);
        }
        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let capacity = config.queue_capacity;
    let topics = config.topics.clone();
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn_filtered(sink, capacity, topics))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn_filtered(sink, capacity, topics))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn_filtered(sink, capacity, topics))
        }
    }
}

/// Fans envelopes from the bus out to every sink
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: Receiver<Envelope>,
}

impl Dispatcher {
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: Receiver<Envelope>) -> Self {
        Self { handles, input_rx }
    }

    pub fn metrics(&self) -> Vec<(String, SinkSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run until the bus closes, then drain and close every sink
    ///
    /// Returns the final per-sink counters.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(self) -> Vec<(String, SinkSnapshot)> {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut count: u64 = 0;
        while let Ok(envelope) = self.input_rx.recv().await {
            count += 1;
            for handle in &self.handles {
                handle.try_send(&envelope);
            }
            if count.is_multiple_of(500) {
                debug!(messages = count, "Dispatcher progress");
            }
        }

        info!(messages = count, "Bus closed, shutting down sinks");
        let mut summary = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            let name = handle.name().to_string();
            let metrics = handle.metrics().clone();
            handle.shutdown().await;
            summary.push((name, metrics.snapshot()));
        }
        info!("Dispatcher shutdown complete");
        summary
    }

    pub fn spawn(self) -> JoinHandle<Vec<(String, SinkSnapshot)>> {
        tokio::spawn(self.run())
    }
}
