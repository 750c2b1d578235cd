//! Error types and completion statuses for the filter.
//!
//! Every failure that reaches a request or sideband caller is reported as an
//! [`NtStatus`]; [`FilterError::status`] performs that mapping.

use std::fmt;

use fireshock_hid_dualshock_protocol::DualShockError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Completion status of a request, mirroring the host's status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NtStatus {
    Success,
    Unsuccessful,
    NotImplemented,
    InvalidParameter,
    NoSuchDevice,
    BufferTooSmall,
    DeviceNotReady,
    IoTimeout,
    Cancelled,
}

impl NtStatus {
    /// Raw 32-bit status value.
    pub const fn code(self) -> u32 {
        match self {
            Self::Success => 0x0000_0000,
            Self::Unsuccessful => 0xC000_0001,
            Self::NotImplemented => 0xC000_0002,
            Self::InvalidParameter => 0xC000_000D,
            Self::NoSuchDevice => 0xC000_000E,
            Self::BufferTooSmall => 0xC000_0023,
            Self::DeviceNotReady => 0xC000_00A3,
            Self::IoTimeout => 0xC000_00B5,
            Self::Cancelled => 0xC000_0120,
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Success => "STATUS_SUCCESS",
            Self::Unsuccessful => "STATUS_UNSUCCESSFUL",
            Self::NotImplemented => "STATUS_NOT_IMPLEMENTED",
            Self::InvalidParameter => "STATUS_INVALID_PARAMETER",
            Self::NoSuchDevice => "STATUS_NO_SUCH_DEVICE",
            Self::BufferTooSmall => "STATUS_BUFFER_TOO_SMALL",
            Self::DeviceNotReady => "STATUS_DEVICE_NOT_READY",
            Self::IoTimeout => "STATUS_IO_TIMEOUT",
            Self::Cancelled => "STATUS_CANCELLED",
        }
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.code())
    }
}

/// Errors that can occur while servicing requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// A request carried malformed or unacceptable parameters.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No session is registered under this serial number.
    #[error("No device with serial {0}")]
    UnknownSerial(u32),

    /// No device is attached at all.
    #[error("No devices attached")]
    NoSuchDevice,

    /// The session exists but its family context is not set up yet.
    #[error("Device {0} is not ready")]
    DeviceNotReady(u32),

    /// The request code is not serviced.
    #[error("Unsupported request code 0x{0:08X}")]
    UnsupportedRequest(u32),

    /// Report or descriptor transformation failed.
    #[error("Protocol error: {0}")]
    Protocol(#[from] DualShockError),

    /// The lower target rejected or failed a transfer.
    #[error("Lower target failed: {0}")]
    Lower(NtStatus),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl FilterError {
    /// Create an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter(reason.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Status the failed request is completed with.
    #[must_use]
    pub fn status(&self) -> NtStatus {
        match self {
            Self::InvalidParameter(_)
            | Self::UnknownSerial(_)
            | Self::InvalidConfiguration(_)
            | Self::UnsupportedRequest(_) => NtStatus::InvalidParameter,
            Self::NoSuchDevice => NtStatus::NoSuchDevice,
            Self::DeviceNotReady(_) => NtStatus::DeviceNotReady,
            Self::Protocol(err) => match err {
                DualShockError::NotImplemented(_) => NtStatus::NotImplemented,
                DualShockError::BufferTooSmall { .. } => NtStatus::BufferTooSmall,
                DualShockError::ReportTooShort { .. }
                | DualShockError::UnexpectedReportId { .. }
                | DualShockError::InvalidSize { .. }
                | DualShockError::BufferMismatch { .. } => NtStatus::InvalidParameter,
            },
            Self::Lower(status) => *status,
        }
    }
}

/// A specialized `Result` type for filter operations.
pub type FilterResult<T> = std::result::Result<T, FilterError>;
