//! Per-device state cached between sensor accesses

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HwmonError;

/// Fan headers on the Commander Core XT
pub const NUM_FANS: usize = 6;
/// Temperature probes on the Commander Core XT
pub const NUM_TEMP_SENSORS: usize = 2;
/// Voltage rails exposed as `in` sensors
pub const NUM_VOLTAGES: usize = 3;

/// Upper bound for any configured channel count
pub const MAX_CHANNELS: usize = u16::BITS as usize;

/// Channel counts the sensor surface is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelLimits {
    pub fans: usize,
    pub temps: usize,
    pub voltages: usize,
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            fans: NUM_FANS,
            temps: NUM_TEMP_SENSORS,
            voltages: NUM_VOLTAGES,
        }
    }
}

impl ChannelLimits {
    /// Board revision with four temperature probes
    pub fn with_four_temps() -> Self {
        Self {
            temps: 4,
            ..Self::default()
        }
    }

    /// Reject counts a `ChannelSet` cannot represent
    pub fn validate(&self) -> Result<(), HwmonError> {
        for (name, value) in [
            ("fans", self.fans),
            ("temps", self.temps),
            ("voltages", self.voltages),
        ] {
            if value > MAX_CHANNELS {
                return Err(HwmonError::InvalidParameter(format!(
                    "{name} limit {value} exceeds {MAX_CHANNELS}"
                )));
            }
        }
        Ok(())
    }
}

/// Bitmap of connected channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelSet(u16);

impl ChannelSet {
    pub fn new() -> Self {
        Self(0)
    }

    /// Mark `channel` connected. Channels beyond the bitmap are ignored.
    pub fn insert(&mut self, channel: usize) {
        if channel < MAX_CHANNELS {
            self.0 |= 1 << channel;
        }
    }

    pub fn contains(&self, channel: usize) -> bool {
        channel < MAX_CHANNELS && self.0 & (1 << channel) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Connected channels in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_CHANNELS).filter(move |&ch| self.contains(ch))
    }
}

impl FromIterator<usize> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::new();
        for ch in iter {
            set.insert(ch);
        }
        set
    }
}

/// Controller firmware version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u16,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Everything the sensor surface needs between device round trips
#[derive(Debug, Clone)]
pub struct DeviceState {
    limits: ChannelLimits,
    pub fans: ChannelSet,
    pub temps: ChannelSet,
    /// `None` until the fan shows up connected in the inventory
    labels: Vec<Option<String>>,
    /// Last software-requested target; `None` means unknown
    targets: Vec<Option<u16>>,
    pub firmware: Option<FirmwareVersion>,
}

impl DeviceState {
    pub fn new(limits: ChannelLimits) -> Self {
        Self {
            limits,
            fans: ChannelSet::new(),
            temps: ChannelSet::new(),
            labels: vec![None; limits.fans],
            targets: vec![None; limits.fans],
            firmware: None,
        }
    }

    pub fn limits(&self) -> &ChannelLimits {
        &self.limits
    }

    /// Record a fan reported connected by the inventory
    pub fn mark_fan_connected(&mut self, channel: usize) {
        if channel >= self.limits.fans {
            return;
        }
        self.fans.insert(channel);
        self.targets[channel] = None;
        self.labels[channel] = Some(format!("fan{}", channel + 1));
    }

    /// Rebuild the fan set from a fresh inventory.
    ///
    /// Channels no longer reported connected lose their label and target.
    pub fn replace_fans(&mut self, connected: ChannelSet) {
        for channel in self.fans.iter().filter(|&ch| !connected.contains(ch)) {
            self.labels[channel] = None;
            self.targets[channel] = None;
        }
        self.fans.clear();
        for channel in connected.iter() {
            self.mark_fan_connected(channel);
        }
    }

    pub fn label(&self, channel: usize) -> Option<&str> {
        self.labels.get(channel).and_then(|l| l.as_deref())
    }

    pub fn target(&self, channel: usize) -> Option<u16> {
        self.targets.get(channel).copied().flatten()
    }

    pub fn set_target(&mut self, channel: usize, target: Option<u16>) {
        if let Some(slot) = self.targets.get_mut(channel) {
            *slot = target;
        }
    }

    /// Forget discovered channels (detach)
    pub fn reset(&mut self) {
        *self = Self::new(self.limits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_set_bits() {
        let mut set = ChannelSet::new();
        assert!(set.is_empty());
        set.insert(0);
        set.insert(2);
        set.insert(MAX_CHANNELS + 3);
        assert!(set.contains(0));
        assert!(!set.contains(1));
        assert!(set.contains(2));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_firmware_display() {
        let fw = FirmwareVersion {
            major: 2,
            minor: 10,
            patch: 219,
        };
        assert_eq!(fw.to_string(), "2.10.219");
    }

    #[test]
    fn test_mark_fan_connected_sets_label_and_clears_target() {
        let mut state = DeviceState::new(ChannelLimits::default());
        state.set_target(2, Some(900));
        state.mark_fan_connected(2);
        assert_eq!(state.label(2), Some("fan3"));
        assert_eq!(state.target(2), None);
        assert!(state.fans.contains(2));

        state.mark_fan_connected(NUM_FANS);
        assert_eq!(state.fans.len(), 1);
    }

    #[test]
    fn test_replace_fans_drops_disconnected_channels() {
        let mut state = DeviceState::new(ChannelLimits::default());
        state.replace_fans([0, 1].into_iter().collect());
        state.set_target(0, Some(500));

        state.replace_fans([1, 3].into_iter().collect());
        assert_eq!(state.fans.iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(state.label(0), None);
        assert_eq!(state.target(0), None);
        assert_eq!(state.label(3), Some("fan4"));

        state.replace_fans(ChannelSet::new());
        assert!(state.fans.is_empty());
        assert_eq!(state.label(1), None);
    }

    #[test]
    fn test_limits_validate() {
        assert!(ChannelLimits::default().validate().is_ok());
        assert_eq!(ChannelLimits::with_four_temps().temps, 4);
        let too_many = ChannelLimits {
            fans: MAX_CHANNELS + 1,
            ..ChannelLimits::default()
        };
        assert!(too_many.validate().is_err());
    }
}
