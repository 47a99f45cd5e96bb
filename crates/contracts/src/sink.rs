//! DataSink trait - Dispatcher output interface
//!
//! Every bus subscriber (log, file, network, in-process channel) is a sink.

use crate::{ContractError, Envelope};

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one bus message
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
