//! Hardware transport error types

use std::fmt;

use thiserror::Error;

/// Transport call that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareOp {
    Configure,
    Start,
    Stop,
    Release,
    RegisterCallback,
    OnlineStatus,
    StereoCalibration,
}

impl HardwareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Release => "release",
            Self::RegisterCallback => "register_callback",
            Self::OnlineStatus => "online_status",
            Self::StereoCalibration => "stereo_calibration",
        }
    }
}

impl fmt::Display for HardwareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware transport error
///
/// Every variant is fatal to acquisition; callers never retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HardwareError {
    /// Transport returned a non-zero status code
    #[error("hardware {operation} failed with code {code}")]
    Call { operation: HardwareOp, code: i32 },

    /// Transport already released
    #[error("hardware {operation} called after release")]
    Released { operation: HardwareOp },
}

impl HardwareError {
    /// Create call failure error
    pub fn call(operation: HardwareOp, code: i32) -> Self {
        Self::Call { operation, code }
    }

    /// Operation that failed
    pub fn operation(&self) -> HardwareOp {
        match self {
            Self::Call { operation, .. } | Self::Released { operation } => *operation,
        }
    }

    /// Transport status code, `None` for local failures
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Call { code, .. } => Some(*code),
            Self::Released { .. } => None,
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, HardwareError>;
