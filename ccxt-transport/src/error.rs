//! Transport error types

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    // Substrate errors
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("HID error: {0}")]
    HidError(String),

    #[error("HID permission denied: {0}")]
    HidPermissionDenied(String),

    // Exchange errors
    #[error("Communication timeout")]
    Timeout,

    #[error("Malformed reply: expected {expected} bytes, got {actual}")]
    Protocol { expected: usize, actual: usize },

    // Device-reported status codes
    #[error("Command not supported by device")]
    Unsupported,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No data for requested channel")]
    NoData,

    #[error("Unknown device status 0x{0:02X}")]
    DeviceStatus(u8),

    // Encoder
    #[error("Write payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classification shared by every layer of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No reply within the exchange timeout
    Timeout,
    /// Reply present but of the wrong length
    Protocol,
    /// Device rejected the command
    Unsupported,
    /// Caller-side range check or device-reported bad parameters
    InvalidArgument,
    /// Disconnected channel, or a channel that is not PWM controlled
    NoData,
    /// Unknown device status or inconsistent response
    Io,
    /// Failure of the underlying HID substrate
    Transport,
}

impl TransportError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout => ErrorKind::Timeout,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Unsupported => ErrorKind::Unsupported,
            Self::InvalidArgument(_) | Self::PayloadTooLarge { .. } => ErrorKind::InvalidArgument,
            Self::NoData => ErrorKind::NoData,
            Self::DeviceStatus(_) | Self::Internal(_) => ErrorKind::Io,
            Self::DeviceNotFound(_)
            | Self::Disconnected
            | Self::HidError(_)
            | Self::HidPermissionDenied(_) => ErrorKind::Transport,
        }
    }
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            TransportError::HidPermissionDenied(msg)
        } else {
            TransportError::HidError(msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_status_variants_classify() {
        assert_eq!(TransportError::Unsupported.kind(), ErrorKind::Unsupported);
        assert_eq!(TransportError::NoData.kind(), ErrorKind::NoData);
        assert_eq!(TransportError::DeviceStatus(0x42).kind(), ErrorKind::Io);
        assert_eq!(
            TransportError::InvalidArgument("bad query".into()).kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn substrate_failures_classify_as_transport() {
        assert_eq!(
            TransportError::HidError("write failed".into()).kind(),
            ErrorKind::Transport
        );
        assert_eq!(TransportError::Disconnected.kind(), ErrorKind::Transport);
    }
}
