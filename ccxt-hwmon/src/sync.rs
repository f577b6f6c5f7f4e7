//! Blocking wrapper for synchronous callers.
//!
//! `SyncCommander` owns a current-thread runtime and drives every
//! `Commander` call to completion on it.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use ccxt_transport::{
    open_session, DiscoveredDevice, HidTransport, PrinterConfig, Session, SessionConfig,
    TransportError,
};

use crate::device::Commander;
use crate::error::HwmonError;
use crate::sensor::{Access, Sensor, SensorValue};
use crate::state::{ChannelLimits, FirmwareVersion};

/// Blocking facade over `Commander`
pub struct SyncCommander {
    runtime: Runtime,
    commander: Commander,
    /// Keeps the HID device and its reader thread alive
    _transport: Option<Arc<HidTransport>>,
}

fn runtime() -> Result<Runtime, HwmonError> {
    Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| TransportError::Internal(format!("failed to build runtime: {e}")).into())
}

impl SyncCommander {
    /// Open and attach `device`
    pub fn open(
        device: &DiscoveredDevice,
        session: SessionConfig,
        limits: ChannelLimits,
        printer: Option<PrinterConfig>,
    ) -> Result<Self, HwmonError> {
        let runtime = runtime()?;
        let (session, transport) = open_session(device, session, printer)?;
        let commander = runtime.block_on(Commander::attach(session, limits))?;
        Ok(Self {
            runtime,
            commander,
            _transport: Some(transport),
        })
    }

    /// Attach over an existing session, e.g. one backed by a simulated device
    pub fn attach(session: Session, limits: ChannelLimits) -> Result<Self, HwmonError> {
        let runtime = runtime()?;
        let commander = runtime.block_on(Commander::attach(session, limits))?;
        Ok(Self {
            runtime,
            commander,
            _transport: None,
        })
    }

    /// Run any async `Commander` operation to completion
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    pub fn commander(&self) -> &Commander {
        &self.commander
    }

    pub fn detach(&self) -> Result<(), HwmonError> {
        self.block_on(self.commander.detach())
    }

    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.commander.firmware_version()
    }

    pub fn fan_rpm(&self, channel: usize) -> Result<i16, HwmonError> {
        self.block_on(self.commander.fan_rpm(channel))
    }

    pub fn fan_pwm(&self, channel: usize) -> Result<u16, HwmonError> {
        self.block_on(self.commander.fan_pwm(channel))
    }

    pub fn set_pwm(&self, channel: usize, value: i64) -> Result<(), HwmonError> {
        self.block_on(self.commander.set_pwm(channel, value))
    }

    pub fn read(&self, sensor: Sensor) -> Result<SensorValue, HwmonError> {
        self.block_on(self.commander.read(sensor))
    }

    pub fn write(&self, sensor: Sensor, value: i64) -> Result<(), HwmonError> {
        self.block_on(self.commander.write(sensor, value))
    }

    pub fn visibility(&self, sensor: Sensor) -> Access {
        self.commander.visibility(sensor)
    }

    pub fn surface(&self) -> Vec<(Sensor, Access)> {
        self.commander.surface()
    }
}
