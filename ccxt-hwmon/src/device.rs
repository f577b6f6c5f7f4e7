//! Commander Core XT device interface
//!
//! `Commander` ties one `Session` to the cached `DeviceState` and exposes
//! the sensor surface: typed accessors per quantity, and the generic
//! `read` / `write` / `visibility` triple over `Sensor`.

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use ccxt_transport::protocol::data_type;
use ccxt_transport::{Command, Endpoint, Session};

use crate::decode::{self, FanInventory};
use crate::error::HwmonError;
use crate::sensor::{Access, FanAttr, Sensor, SensorValue};
use crate::state::{ChannelLimits, ChannelSet, DeviceState, FirmwareVersion};

/// Highest host PWM value
pub const PWM_MAX: i64 = 255;
/// Highest fan target the controller could accept
pub const TARGET_MAX: i64 = 0xFFFF;

/// High-level interface to one controller
pub struct Commander {
    session: Session,
    /// Short lock; never held across a device round trip
    state: Mutex<DeviceState>,
}

impl Commander {
    /// Wrap a session without talking to the device
    pub fn new(session: Session, limits: ChannelLimits) -> Self {
        Self {
            session,
            state: Mutex::new(DeviceState::new(limits)),
        }
    }

    /// Bring the controller online.
    ///
    /// Software mode and fan discovery must succeed. Temperature discovery,
    /// firmware and bootloader queries are optional and only logged on failure.
    pub async fn attach(session: Session, limits: ChannelLimits) -> Result<Self, HwmonError> {
        limits.validate()?;
        let commander = Self::new(session, limits);

        commander.set_software_mode().await?;
        let inventory = commander.discover_fans().await?;
        info!(
            "{} of {} fan ports connected",
            inventory.connected.len(),
            inventory.count
        );

        if let Err(e) = commander.discover_temperatures().await {
            info!("temperature probes unavailable: {}", e);
        }
        match commander.query_firmware().await {
            Ok(fw) => info!("firmware version {}", fw),
            Err(e) => warn!("failed to read firmware version: {}", e),
        }
        if let Err(e) = commander.bootloader_version().await {
            debug!("bootloader version unavailable: {}", e);
        }

        Ok(commander)
    }

    /// Hand control back to the controller and forget discovered channels
    pub async fn detach(&self) -> Result<(), HwmonError> {
        self.state.lock().reset();
        self.set_hardware_mode().await
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn limits(&self) -> ChannelLimits {
        *self.state.lock().limits()
    }

    pub fn connected_fans(&self) -> ChannelSet {
        self.state.lock().fans
    }

    // === Modes ===

    /// Take over fan control from the controller
    pub async fn set_software_mode(&self) -> Result<(), HwmonError> {
        self.session.command(Command::SOFTWARE_MODE).await?;
        debug!("switched to software mode");
        Ok(())
    }

    /// Return fan control to the controller's own curves
    pub async fn set_hardware_mode(&self) -> Result<(), HwmonError> {
        self.session.command(Command::HARDWARE_MODE).await?;
        debug!("switched to hardware mode");
        Ok(())
    }

    // === Discovery ===

    /// Read the fan inventory and mark connected channels
    pub async fn discover_fans(&self) -> Result<FanInventory, HwmonError> {
        let data = self.session.read_endpoint(Endpoint::FanInventory).await?;
        let mut state = self.state.lock();
        let inventory = decode::fan_inventory(data.bytes(), state.limits().fans);
        state.replace_fans(inventory.connected);
        Ok(inventory)
    }

    /// Read the temperature inventory.
    ///
    /// Probe states cannot be decoded yet, so this always fails after the
    /// read transaction and no probe is ever published.
    pub async fn discover_temperatures(&self) -> Result<ChannelSet, HwmonError> {
        let data = self
            .session
            .read_endpoint(Endpoint::TemperatureInventory)
            .await?;
        let max = self.state.lock().limits().temps;
        let temps = decode::temperature_inventory(data.bytes(), max)?;
        self.state.lock().temps = temps;
        Ok(temps)
    }

    // === Introspection ===

    /// Query the firmware version and cache it for the session
    async fn query_firmware(&self) -> Result<FirmwareVersion, HwmonError> {
        let reply = self.session.command(Command::GET_FIRMWARE).await?;
        let fw = decode::firmware_version(reply.as_bytes())?;
        self.state.lock().firmware = Some(fw);
        Ok(fw)
    }

    /// Firmware version fetched at attach, if the query succeeded
    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.state.lock().firmware
    }

    /// The bootloader query of this controller is unknown
    pub async fn bootloader_version(&self) -> Result<String, HwmonError> {
        Err(HwmonError::NotSupported(
            "bootloader version query".into(),
        ))
    }

    // === Fans ===

    fn check_fan(&self, channel: usize) -> Result<(), HwmonError> {
        let fans = self.state.lock().limits().fans;
        if channel >= fans {
            return Err(HwmonError::InvalidParameter(format!(
                "fan channel {channel} out of range (0-{})",
                fans.saturating_sub(1)
            )));
        }
        Ok(())
    }

    /// Current fan speed in rpm
    pub async fn fan_rpm(&self, channel: usize) -> Result<i16, HwmonError> {
        self.check_fan(channel)?;
        let data = self.session.read_endpoint(Endpoint::FanState).await?;
        decode::fan_rpm(data.bytes(), channel, self.limits().fans)
    }

    /// Current fan PWM (0-255)
    pub async fn fan_pwm(&self, channel: usize) -> Result<u16, HwmonError> {
        self.check_fan(channel)?;
        let data = self.session.read_endpoint(Endpoint::FanPwm).await?;
        decode::fan_pwm(data.bytes(), channel, self.limits().fans)
    }

    /// Set a fan's PWM (0-255). Clears the channel's cached target on success.
    pub async fn set_pwm(&self, channel: usize, value: i64) -> Result<(), HwmonError> {
        self.check_fan(channel)?;
        if !(0..=PWM_MAX).contains(&value) {
            return Err(HwmonError::InvalidParameter(format!(
                "pwm {value} out of range (0-{PWM_MAX})"
            )));
        }

        let duty = decode::pwm_to_duty(value as u8);
        // {count, id, mode, duty, 0}
        let speed = [1, channel as u8, 0, duty, 0];
        self.session
            .write_endpoint(Endpoint::FanPwm, data_type::SET_SPEED, &speed)
            .await?;

        self.state.lock().set_target(channel, None);
        debug!("fan{} pwm set to {} ({}%)", channel, value, duty);
        Ok(())
    }

    /// Last target requested for a fan
    pub fn fan_target(&self, channel: usize) -> Result<u16, HwmonError> {
        self.check_fan(channel)?;
        self.state.lock().target(channel).ok_or(HwmonError::NoData)
    }

    /// Record a fan target.
    ///
    /// The value is clamped and cached, but this protocol version has no
    /// target command, so the call always fails afterwards.
    pub async fn set_target(&self, channel: usize, value: i64) -> Result<(), HwmonError> {
        self.check_fan(channel)?;
        let target = value.clamp(0, TARGET_MAX) as u16;
        self.state.lock().set_target(channel, Some(target));
        Err(HwmonError::NotSupported(
            "setting fan targets on the device".into(),
        ))
    }

    pub fn fan_label(&self, channel: usize) -> Result<String, HwmonError> {
        self.check_fan(channel)?;
        self.state
            .lock()
            .label(channel)
            .map(str::to_string)
            .ok_or(HwmonError::NoData)
    }

    // === Generic sensor surface ===

    pub fn visibility(&self, sensor: Sensor) -> Access {
        sensor.visibility(&self.state.lock())
    }

    /// Every published attribute with its access mode
    pub fn surface(&self) -> Vec<(Sensor, Access)> {
        let state = self.state.lock();
        Sensor::all(state.limits())
            .into_iter()
            .map(|s| (s, s.visibility(&state)))
            .filter(|(_, access)| access.is_visible())
            .collect()
    }

    fn check_published(&self, sensor: Sensor) -> Result<Access, HwmonError> {
        let state = self.state.lock();
        if !sensor.in_range(state.limits()) {
            return Err(HwmonError::InvalidParameter(format!(
                "{sensor}: channel out of range"
            )));
        }
        match sensor.visibility(&state) {
            Access::Hidden => Err(HwmonError::NotSupported(format!(
                "{sensor} is not published"
            ))),
            access => Ok(access),
        }
    }

    /// Read any published attribute
    pub async fn read(&self, sensor: Sensor) -> Result<SensorValue, HwmonError> {
        self.check_published(sensor)?;
        match sensor {
            Sensor::Fan(ch, FanAttr::Input) => Ok(SensorValue::Int(self.fan_rpm(ch).await?.into())),
            Sensor::Fan(ch, FanAttr::Label) => Ok(SensorValue::Text(self.fan_label(ch)?)),
            Sensor::Fan(ch, FanAttr::Target) => Ok(SensorValue::Int(self.fan_target(ch)?.into())),
            Sensor::Pwm(ch) => Ok(SensorValue::Int(self.fan_pwm(ch).await?.into())),
            Sensor::Temperature(_) | Sensor::Voltage(_) => Err(HwmonError::NotSupported(format!(
                "{sensor} has no device query"
            ))),
        }
    }

    /// Write any published read-write attribute
    pub async fn write(&self, sensor: Sensor, value: i64) -> Result<(), HwmonError> {
        if !self.check_published(sensor)?.is_writable() {
            return Err(HwmonError::NotSupported(format!("{sensor} is read-only")));
        }
        match sensor {
            Sensor::Pwm(ch) => self.set_pwm(ch, value).await,
            Sensor::Fan(ch, FanAttr::Target) => self.set_target(ch, value).await,
            Sensor::Fan(_, FanAttr::Input | FanAttr::Label)
            | Sensor::Temperature(_)
            | Sensor::Voltage(_) => Err(HwmonError::NotSupported(format!("{sensor} is read-only"))),
        }
    }
}
