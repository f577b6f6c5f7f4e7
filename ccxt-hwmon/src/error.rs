//! Sensor interface error types

use ccxt_transport::{ErrorKind, TransportError};
use thiserror::Error;

/// Errors from sensor and device operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HwmonError {
    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Nothing cached and nothing the device can report
    #[error("No data available")]
    NoData,

    /// Feature not supported by this device or protocol version
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Device returned a reply that contradicts the request
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl HwmonError {
    /// Classify into the shared error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            HwmonError::Transport(e) => e.kind(),
            HwmonError::InvalidParameter(_) => ErrorKind::InvalidArgument,
            HwmonError::NoData => ErrorKind::NoData,
            HwmonError::NotSupported(_) => ErrorKind::Unsupported,
            HwmonError::UnexpectedResponse(_) => ErrorKind::Io,
        }
    }
}
