//! Transport layer for Corsair Commander Core XT communication
//!
//! This crate speaks the controller's fixed-size binary command protocol:
//!
//! - frame encoding (`protocol`)
//! - the send / wait-for-reply exchange with timeout and status mapping (`session`)
//! - endpoint read and write transactions (`session`)
//! - the hidapi substrate adapter and its input reader thread (`hid`)
//! - a monitoring middleware that prints outgoing frames (`printer`)

pub mod device_registry;
pub mod error;
pub mod printer;
pub mod protocol;
pub mod reply;
pub mod session;
pub mod types;

mod discovery;
mod hid;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use device_registry::{is_supported, COMMANDER_CORE_XT_PID, VENDOR_ID};
pub use discovery::{open_session, HidDiscovery};
pub use error::{ErrorKind, TransportError};
pub use hid::HidTransport;
pub use printer::{describe_frame, hex_dump, Printer, PrinterConfig, PrinterSink};
pub use protocol::{Command, Endpoint, InFrame, OutFrame};
pub use reply::ReplyCapture;
pub use session::{EndpointData, Session, SessionConfig};
pub use types::{DeviceInfo, DiscoveredDevice};

use async_trait::async_trait;

/// The substrate every backend implements: deliver one raw output report.
///
/// Replies do not come back through this trait; the backend feeds every
/// input report to the `ReplyCapture` of the session it serves.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Send one complete output report (report ID byte included)
    async fn send_output_report(&self, report: &[u8]) -> Result<(), TransportError>;

    /// Get device information
    fn device_info(&self) -> &DeviceInfo;
}
