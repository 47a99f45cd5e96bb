//! Acquisition 错误类型

use contracts::{ContractError, PayloadKind};
use hardware::{DecodeError, HardwareError};
use thiserror::Error;

/// Acquisition 错误
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Payload 解析失败 (transient, payload dropped)
    #[error("failed to decode {kind} payload: {source}")]
    Decode {
        kind: PayloadKind,
        #[source]
        source: DecodeError,
    },

    /// Payload 内容为空 (transient, payload dropped)
    #[error("{kind} payload has no content")]
    MissingPayload { kind: PayloadKind },

    /// 硬件调用失败 (fatal)
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// cycle-ready 等待超时 (fatal)
    #[error("no cycle-ready signal within {timeout_ms} ms")]
    CycleTimeout { timeout_ms: u64 },

    /// 轮换列表为空
    #[error("camera rotation list is empty")]
    EmptyRotation,

    /// 轮换未启动或已停止
    #[error("rotation is not acquiring")]
    NotAcquiring,

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl AcquisitionError {
    /// Transient errors only cost the current payload
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::MissingPayload { .. })
    }
}

/// Acquisition Result 类型别名
pub type Result<T> = std::result::Result<T, AcquisitionError>;
