//! Device discovery for Commander Core XT controllers

use std::ffi::CString;
use std::sync::Arc;

use hidapi::HidApi;
use tracing::{debug, info};

use crate::device_registry;
use crate::error::TransportError;
use crate::hid::HidTransport;
use crate::printer::{Printer, PrinterConfig, PrinterSink};
use crate::session::{Session, SessionConfig};
use crate::types::{DeviceInfo, DiscoveredDevice};
use crate::ReportSink;

/// HID device discovery by VID/PID
pub struct HidDiscovery {
    /// Known VID/PID pairs to look for
    known_devices: Vec<(u16, u16)>,
}

impl Default for HidDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl HidDiscovery {
    /// Create a discovery instance for every supported controller
    pub fn new() -> Self {
        Self {
            known_devices: device_registry::SUPPORTED_PIDS
                .iter()
                .map(|&pid| (device_registry::VENDOR_ID, pid))
                .collect(),
        }
    }

    /// Add a VID/PID pair to discover
    pub fn add_device(&mut self, vid: u16, pid: u16) {
        if !self.known_devices.contains(&(vid, pid)) {
            self.known_devices.push((vid, pid));
        }
    }

    fn is_known_device(&self, vid: u16, pid: u16) -> bool {
        self.known_devices.contains(&(vid, pid))
    }

    /// List currently connected controllers
    pub fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        let api = HidApi::new()?;
        let mut devices = Vec::new();

        for device_info in api.device_list() {
            let vid = device_info.vendor_id();
            let pid = device_info.product_id();
            if !self.is_known_device(vid, pid) {
                continue;
            }

            let path = device_info.path().to_string_lossy().to_string();
            debug!("Found device: VID={:04X} PID={:04X} path={}", vid, pid, path);

            devices.push(DiscoveredDevice {
                info: DeviceInfo {
                    vid,
                    pid,
                    device_path: path,
                    interface: device_info.interface_number(),
                    serial: device_info.serial_number().map(|s| s.to_string()),
                    product_name: device_info.product_string().map(|s| s.to_string()),
                },
            });
        }

        info!("Found {} devices", devices.len());
        Ok(devices)
    }

    /// Open a specific device. The input reader is not started yet.
    pub fn open_device(&self, device: &DiscoveredDevice) -> Result<HidTransport, TransportError> {
        let api = HidApi::new()?;
        let path = CString::new(device.info.device_path.as_str()).map_err(|_| {
            TransportError::InvalidArgument(format!(
                "device path contains NUL: {}",
                device.info.device_path
            ))
        })?;
        let hid = api.open_path(&path)?;

        info!(
            "Opened {:04X}:{:04X} at {}",
            device.info.vid, device.info.pid, device.info.device_path
        );
        Ok(HidTransport::new(hid, device.info.clone()))
    }

    /// First connected controller
    pub fn find_first(&self) -> Result<DiscoveredDevice, TransportError> {
        self.list_devices()?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::DeviceNotFound("no Commander Core XT found".into()))
    }
}

/// Open `device` and wire it to a fresh session.
///
/// The returned transport owns the input reader thread; dropping it stops
/// the reader. With a printer config, frames in both directions are printed.
pub fn open_session(
    device: &DiscoveredDevice,
    config: SessionConfig,
    printer: Option<PrinterConfig>,
) -> Result<(Session, Arc<HidTransport>), TransportError> {
    let transport = Arc::new(HidDiscovery::new().open_device(device)?);

    let sink: Arc<dyn ReportSink> = match &printer {
        Some(cfg) => PrinterSink::wrap(Arc::clone(&transport) as Arc<dyn ReportSink>, cfg.clone()),
        None => Arc::clone(&transport) as Arc<dyn ReportSink>,
    };
    let session = Session::new(sink, config);
    let capture = session.capture();

    match printer {
        Some(cfg) => {
            let printer = Printer::new(cfg);
            transport.start_reader_with(move |report| {
                printer.print_input(report);
                capture.deliver(report);
            })?;
        }
        None => transport.start_reader(capture)?,
    }

    Ok((session, transport))
}
