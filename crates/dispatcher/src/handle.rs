//! SinkHandle - one sink behind its own queue and worker task

use std::sync::Arc;

use contracts::{DataSink, Envelope};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    /// Accepted topics; empty accepts all
    topics: Vec<String>,
    tx: mpsc::Sender<Envelope>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn a worker accepting every topic
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        Self::spawn_filtered(sink, queue_capacity, Vec::new())
    }

    /// Spawn a worker that only receives `topics`
    pub fn spawn_filtered<S: DataSink + Send + 'static>(
        sink: S,
        queue_capacity: usize,
        topics: Vec<String>,
    ) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = tokio::spawn(sink_worker(sink, rx, metrics.clone(), name.clone()));

        Self {
            name,
            topics,
            tx,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    pub fn accepts(&self, topic: &str) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| t == topic)
    }

    /// Hand an envelope to the worker without waiting
    ///
    /// Returns false when filtered out, queue full, or worker gone.
    pub fn try_send(&self, envelope: &Envelope) -> bool {
        if !self.accepts(&envelope.topic) {
            self.metrics.record_filtered();
            return false;
        }
        match self.tx.try_send(envelope.clone()) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(envelope)) => {
                self.metrics.record_dropped();
                warn!(sink = %self.name, topic = %envelope.topic, "Queue full, message dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Close the queue and wait for the worker to drain it
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

#[instrument(name = "sink_worker_loop", skip(sink, rx, metrics), fields(sink = %name))]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Envelope>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!("Sink worker started");

    while let Some(envelope) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        let result = sink.write(&envelope).await;
        metrics.record_write(result.is_ok());
        observability::record_message_dispatched(&name, result.is_ok());
        if let Err(e) = result {
            error!(topic = %envelope.topic, error = %e, "Write failed");
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "Close failed on shutdown");
    }

    debug!("Sink worker stopped");
}
