//! hidapi-backed substrate for direct USB connection
//!
//! Output reports go out through `hid_write`. A dedicated reader thread
//! polls for input reports and hands every one of them to the session's
//! `ReplyCapture`, which decides whether anyone is waiting for it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use hidapi::HidDevice;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::protocol::{timing, IN_FRAME_SIZE};
use crate::reply::ReplyCapture;
use crate::types::DeviceInfo;
use crate::ReportSink;

/// Large enough that an oversized report is seen with its real length
const READ_BUFFER_SIZE: usize = 2 * IN_FRAME_SIZE;

/// HID transport for a controller connected via USB
pub struct HidTransport {
    /// Shared with the reader thread; locked per read/write call only
    device: Arc<Mutex<HidDevice>>,
    info: DeviceInfo,
    shutdown: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl HidTransport {
    /// Wrap an opened HID device. No input is consumed until `start_reader`.
    pub fn new(device: HidDevice, info: DeviceInfo) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            info,
            shutdown: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        }
    }

    /// Spawn the input reader thread feeding `capture`
    pub fn start_reader(&self, capture: ReplyCapture) -> Result<(), TransportError> {
        self.start_reader_with(move |report| {
            capture.deliver(report);
        })
    }

    /// Spawn the input reader thread; `on_report` sees every input report
    pub fn start_reader_with<F>(&self, on_report: F) -> Result<(), TransportError>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let mut reader = self.reader.lock();
        if reader.is_some() {
            return Err(TransportError::Internal(
                "input reader already running".into(),
            ));
        }

        let device = Arc::clone(&self.device);
        let shutdown = Arc::clone(&self.shutdown);
        let handle = std::thread::Builder::new()
            .name("ccxt-input-reader".into())
            .spawn(move || run_reader_loop(device, on_report, shutdown))
            .map_err(|e| TransportError::Internal(format!("failed to spawn reader: {e}")))?;

        *reader = Some(handle);
        Ok(())
    }
}

/// Poll input reports until shutdown
fn run_reader_loop<F>(device: Arc<Mutex<HidDevice>>, mut on_report: F, shutdown: Arc<AtomicBool>)
where
    F: FnMut(&[u8]),
{
    debug!("input reader thread started");
    let mut buf = [0u8; READ_BUFFER_SIZE];

    while !shutdown.load(Ordering::Relaxed) {
        // Short timeout: it only bounds how long a writer waits for the lock
        let result = device.lock().read_timeout(&mut buf, timing::READER_POLL_MS);
        match result {
            Ok(len) if len > 0 => {
                on_report(&buf[..len]);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("input reader error: {}", e);
                std::thread::sleep(Duration::from_millis(timing::READER_ERROR_SLEEP_MS));
            }
        }
    }

    debug!("input reader thread exiting");
}

#[async_trait]
impl ReportSink for HidTransport {
    async fn send_output_report(&self, report: &[u8]) -> Result<(), TransportError> {
        let written = self.device.lock().write(report)?;
        if written < report.len() {
            return Err(TransportError::HidError(format!(
                "short write: {written} of {} bytes",
                report.len()
            )));
        }
        Ok(())
    }

    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }
}

impl Drop for HidTransport {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.reader.lock().take() {
            if handle.join().is_err() {
                warn!("input reader thread panicked");
            }
        }
        debug!("HidTransport dropped");
    }
}
