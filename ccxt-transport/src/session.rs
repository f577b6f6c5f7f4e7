//! Per-device protocol session
//!
//! `Session` owns the frame buffers of one controller and serializes every
//! exchange and endpoint transaction behind a single device lock:
//!
//! ```text
//! [Commander / CLI]
//!        |
//!    [Session]        ← device lock, encode, exchange, endpoint transactions
//!        |     ^
//!        v     | ReplyCapture (input reader thread)
//!   [ReportSink]      ← raw output reports (hidapi, printer, mock)
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::protocol::{
    check_status, timing, Command, Endpoint, InFrame, OutFrame, DATA_TYPE_SIZE, IN_FRAME_SIZE,
};
use crate::reply::{ReplyCapture, ReplySlot};
use crate::ReportSink;

/// Tunables for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long one exchange waits for its reply (ms)
    pub reply_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: timing::REPLY_TIMEOUT_MS,
        }
    }
}

impl SessionConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

/// Payload captured by a completed endpoint transaction
#[derive(Debug, Clone)]
pub struct EndpointData {
    endpoint: Endpoint,
    frame: InFrame,
    trailing_close: Option<TransportError>,
}

impl EndpointData {
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn bytes(&self) -> &[u8; IN_FRAME_SIZE] {
        self.frame.as_bytes()
    }

    pub fn received_len(&self) -> usize {
        self.frame.received_len()
    }

    /// Failure of the close exchange that ended the transaction.
    ///
    /// The payload was already captured when this happened, so it does not
    /// invalidate `bytes()`; the endpoint may however still be open on the device.
    pub fn trailing_close_error(&self) -> Option<&TransportError> {
        self.trailing_close.as_ref()
    }
}

/// Buffers shared by every exchange of one device
#[derive(Default)]
struct Buffers {
    out: OutFrame,
    input: InFrame,
    data: InFrame,
}

/// Protocol session for one controller
pub struct Session {
    sink: Arc<dyn ReportSink>,
    slot: Arc<ReplySlot>,
    /// Device lock: held from encoding through reply inspection
    buffers: Mutex<Buffers>,
    config: SessionConfig,
}

impl Session {
    pub fn new(sink: Arc<dyn ReportSink>, config: SessionConfig) -> Self {
        Self {
            sink,
            slot: Arc::new(ReplySlot::default()),
            buffers: Mutex::new(Buffers::default()),
            config,
        }
    }

    /// Handle for the input path; every raw input report must be fed to it
    pub fn capture(&self) -> ReplyCapture {
        ReplyCapture::new(Arc::clone(&self.slot))
    }

    pub fn sink(&self) -> &Arc<dyn ReportSink> {
        &self.sink
    }

    /// Send a bare command and return its (status-checked) reply
    pub async fn command(&self, cmd: Command) -> Result<InFrame, TransportError> {
        let mut bufs = self.buffers.lock().await;
        bufs.out = OutFrame::command(cmd);
        self.exchange(&mut bufs).await?;
        Ok(bufs.input.clone())
    }

    /// Read transaction: close, open, read, close.
    ///
    /// The read reply is copied out before the trailing close so the close
    /// round trip cannot clobber it.
    pub async fn read_endpoint(&self, endpoint: Endpoint) -> Result<EndpointData, TransportError> {
        let mut bufs = self.buffers.lock().await;
        debug!("reading endpoint {}", endpoint);

        self.endpoint_exchange(&mut bufs, Command::CLOSE_ENDPOINT, endpoint)
            .await?;
        self.endpoint_exchange(&mut bufs, Command::OPEN_ENDPOINT, endpoint)
            .await?;
        self.endpoint_exchange(&mut bufs, Command::READ, endpoint)
            .await?;

        bufs.data = bufs.input.clone();
        Ok(self.finish_transaction(&mut bufs, endpoint).await)
    }

    /// Write transaction: close, open, write, close.
    pub async fn write_endpoint(
        &self,
        endpoint: Endpoint,
        data_type: [u8; DATA_TYPE_SIZE],
        data: &[u8],
    ) -> Result<EndpointData, TransportError> {
        let frame = OutFrame::write(data_type, data)?;
        let mut bufs = self.buffers.lock().await;
        debug!("writing {} bytes to endpoint {}", data.len(), endpoint);

        self.endpoint_exchange(&mut bufs, Command::CLOSE_ENDPOINT, endpoint)
            .await?;
        self.endpoint_exchange(&mut bufs, Command::OPEN_ENDPOINT, endpoint)
            .await?;

        bufs.out = frame;
        self.exchange(&mut bufs).await?;

        bufs.data = bufs.input.clone();
        Ok(self.finish_transaction(&mut bufs, endpoint).await)
    }

    /// Trailing close; its failure is reported on the result, not raised
    async fn finish_transaction(&self, bufs: &mut Buffers, endpoint: Endpoint) -> EndpointData {
        let trailing_close = self
            .endpoint_exchange(bufs, Command::CLOSE_ENDPOINT, endpoint)
            .await
            .err();
        if let Some(ref e) = trailing_close {
            warn!("closing endpoint {} failed: {}", endpoint, e);
        }
        EndpointData {
            endpoint,
            frame: bufs.data.clone(),
            trailing_close,
        }
    }

    async fn endpoint_exchange(
        &self,
        bufs: &mut Buffers,
        cmd: Command,
        endpoint: Endpoint,
    ) -> Result<(), TransportError> {
        bufs.out = OutFrame::endpoint_command(cmd, endpoint);
        self.exchange(bufs).await
    }

    /// Send `bufs.out`, wait for the reply into `bufs.input`, check its status.
    ///
    /// Callers must hold the device lock (enforced by taking `&mut Buffers`).
    async fn exchange(&self, bufs: &mut Buffers) -> Result<(), TransportError> {
        let reply = self.slot.arm();
        debug!("-> {:02X?}", bufs.out.content());

        if let Err(e) = self.sink.send_output_report(bufs.out.as_bytes()).await {
            self.slot.disarm();
            return Err(e);
        }

        let frame = match tokio::time::timeout(self.config.reply_timeout(), reply).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(_)) => {
                // Sender vanished without a reply
                return Err(TransportError::Disconnected);
            }
            Err(_) => {
                self.slot.disarm();
                debug!("no reply within {:?}", self.config.reply_timeout());
                return Err(TransportError::Timeout);
            }
        };

        debug!("<- {:?}", frame);
        bufs.input = frame;
        if !bufs.input.is_complete() {
            return Err(TransportError::Protocol {
                expected: IN_FRAME_SIZE,
                actual: bufs.input.received_len(),
            });
        }
        check_status(bufs.input.status())
    }
}
