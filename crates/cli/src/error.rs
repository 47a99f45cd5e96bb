//! Error types for CLI operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// A fatal hardware or rotation failure ended the run
    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] acquisition::AcquisitionError),

    #[error("Watchdog setup failed: {0}")]
    Watchdog(#[from] watchdog::WatchdogError),

    #[error("Dispatcher setup failed: {0}")]
    Dispatcher(#[from] dispatcher::DispatcherError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }
}
