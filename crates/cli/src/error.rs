//! Error types for fireshockctl

use fireshock_filter::FilterError;
use fireshock_hid_dualshock_protocol::DualShockError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid hex input: {0}")]
    InvalidHex(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] DualShockError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Simulation failed: {0}")]
    Simulation(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidHex(_) | Self::Protocol(_) => 2,
            Self::InvalidConfiguration(_) | Self::JsonError(_) => 4,
            Self::Filter(_) | Self::Simulation(_) => 5,
            Self::IoError(_) => 1,
        }
    }
}
