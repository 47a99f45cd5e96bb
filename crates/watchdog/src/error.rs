//! Watchdog 错误类型
//!
//! Only construction can fail. Once built, touching and evaluating never error.

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error("heartbeat source '{0}' registered twice")]
    DuplicateSource(String),

    #[error("unknown heartbeat source '{0}'")]
    UnknownSource(String),

    #[error("no heartbeat sources configured")]
    NoSources,

    #[error(transparent)]
    Contract(#[from] ContractError),
}

pub type Result<T> = std::result::Result<T, WatchdogError>;
