//! Error types for DualShock protocol encoding and decoding.

use thiserror::Error;

/// Errors produced by the pure protocol functions in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DualShockError {
    /// The raw report is shorter than the layout requires.
    #[error("report too short: expected at least {expected} bytes, got {actual}")]
    ReportTooShort { expected: usize, actual: usize },

    /// The report id at offset 0 does not match the layout.
    #[error("unexpected report id 0x{actual:02X} (expected 0x{expected:02X})")]
    UnexpectedReportId { expected: u8, actual: u8 },

    /// The caller-provided output buffer cannot hold the result.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// No synthesized data exists for this device family.
    #[error("not implemented for {0:?}")]
    NotImplemented(crate::ids::DeviceType),

    /// A sideband structure declared a size other than its canonical size.
    #[error("invalid structure size: declared {declared}, canonical {canonical}")]
    InvalidSize { declared: usize, canonical: usize },

    /// The transport buffer length differs from the declared structure size.
    #[error("buffer length {actual} does not match declared size {declared}")]
    BufferMismatch { declared: usize, actual: usize },
}

impl DualShockError {
    /// Create a report-too-short error.
    #[must_use]
    pub const fn report_too_short(expected: usize, actual: usize) -> Self {
        Self::ReportTooShort { expected, actual }
    }

    /// Create a buffer-too-small error.
    #[must_use]
    pub const fn buffer_too_small(needed: usize, available: usize) -> Self {
        Self::BufferTooSmall { needed, available }
    }
}

/// A specialized `Result` type for protocol operations.
pub type DualShockResult<T> = std::result::Result<T, DualShockError>;
