//! Sensor addressing in hwmon terms
//!
//! Every attribute the driver exposes is one `Sensor` value. Channels are
//! zero-based internally; names follow hwmon numbering (`fan1_input` is fan
//! channel 0, `in0_input` is voltage channel 0).

use std::fmt;
use std::str::FromStr;

use crate::state::{ChannelLimits, DeviceState};

/// Attributes of a fan channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanAttr {
    /// Tachometer reading (rpm)
    Input,
    /// Static label (`fanN`)
    Label,
    /// Last requested target
    Target,
}

/// One addressable sensor attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    Temperature(usize),
    Fan(usize, FanAttr),
    Pwm(usize),
    Voltage(usize),
}

/// Permission an attribute is published with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Hidden,
    ReadOnly,
    ReadWrite,
}

impl Access {
    /// sysfs-style file mode
    pub fn mode(self) -> u32 {
        match self {
            Access::Hidden => 0,
            Access::ReadOnly => 0o444,
            Access::ReadWrite => 0o644,
        }
    }

    pub fn is_visible(self) -> bool {
        self != Access::Hidden
    }

    pub fn is_writable(self) -> bool {
        self == Access::ReadWrite
    }
}

/// Value read from a sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Int(v) => write!(f, "{v}"),
            SensorValue::Text(s) => f.write_str(s),
        }
    }
}

impl Sensor {
    pub fn channel(self) -> usize {
        match self {
            Sensor::Temperature(ch) | Sensor::Fan(ch, _) | Sensor::Pwm(ch) | Sensor::Voltage(ch) => {
                ch
            }
        }
    }

    /// Whether the channel exists on a board with these limits
    pub fn in_range(self, limits: &ChannelLimits) -> bool {
        let bound = match self {
            Sensor::Temperature(_) => limits.temps,
            Sensor::Fan(..) | Sensor::Pwm(_) => limits.fans,
            Sensor::Voltage(_) => limits.voltages,
        };
        self.channel() < bound
    }

    /// Publication mode given the discovered connectivity
    pub fn visibility(self, state: &DeviceState) -> Access {
        if !self.in_range(state.limits()) {
            return Access::Hidden;
        }
        match self {
            Sensor::Temperature(ch) if state.temps.contains(ch) => Access::ReadOnly,
            Sensor::Temperature(_) => Access::Hidden,
            Sensor::Fan(ch, attr) if state.fans.contains(ch) => match attr {
                FanAttr::Input | FanAttr::Label => Access::ReadOnly,
                FanAttr::Target => Access::ReadWrite,
            },
            Sensor::Fan(..) => Access::Hidden,
            Sensor::Pwm(ch) if state.fans.contains(ch) => Access::ReadWrite,
            Sensor::Pwm(_) => Access::Hidden,
            // No rail reports connectivity
            Sensor::Voltage(_) => Access::Hidden,
        }
    }

    /// Every attribute a board with these limits could publish
    pub fn all(limits: &ChannelLimits) -> Vec<Sensor> {
        let mut sensors = Vec::new();
        sensors.extend((0..limits.temps).map(Sensor::Temperature));
        for ch in 0..limits.fans {
            sensors.push(Sensor::Fan(ch, FanAttr::Input));
            sensors.push(Sensor::Fan(ch, FanAttr::Label));
            sensors.push(Sensor::Fan(ch, FanAttr::Target));
        }
        sensors.extend((0..limits.fans).map(Sensor::Pwm));
        sensors.extend((0..limits.voltages).map(Sensor::Voltage));
        sensors
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Sensor::Temperature(ch) => write!(f, "temp{}_input", ch + 1),
            Sensor::Fan(ch, FanAttr::Input) => write!(f, "fan{}_input", ch + 1),
            Sensor::Fan(ch, FanAttr::Label) => write!(f, "fan{}_label", ch + 1),
            Sensor::Fan(ch, FanAttr::Target) => write!(f, "fan{}_target", ch + 1),
            Sensor::Pwm(ch) => write!(f, "pwm{}", ch + 1),
            Sensor::Voltage(ch) => write!(f, "in{}_input", ch),
        }
    }
}

/// Split `fan12_input` into (`fan`, 12, `input`)
fn split_name(s: &str) -> Option<(&str, usize, &str)> {
    let digits_at = s.find(|c: char| c.is_ascii_digit())?;
    let (prefix, rest) = s.split_at(digits_at);
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (digits, suffix) = rest.split_at(digits_end);
    let index = digits.parse().ok()?;
    Some((prefix, index, suffix.strip_prefix('_').unwrap_or(suffix)))
}

impl FromStr for Sensor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || {
            format!(
                "unknown sensor: \"{s}\". Use tempN_input, fanN_input, fanN_label, fanN_target, pwmN or inN_input"
            )
        };
        let lower = s.to_ascii_lowercase();
        let (prefix, index, attr) = split_name(&lower).ok_or_else(err)?;

        // hwmon numbers everything from 1 except voltages
        let one_based = |n: usize| n.checked_sub(1).ok_or_else(err);
        match (prefix, attr) {
            ("temp", "input") => Ok(Sensor::Temperature(one_based(index)?)),
            ("fan", "input") => Ok(Sensor::Fan(one_based(index)?, FanAttr::Input)),
            ("fan", "label") => Ok(Sensor::Fan(one_based(index)?, FanAttr::Label)),
            ("fan", "target") => Ok(Sensor::Fan(one_based(index)?, FanAttr::Target)),
            ("pwm", "") | ("pwm", "input") => Ok(Sensor::Pwm(one_based(index)?)),
            ("in", "input") => Ok(Sensor::Voltage(index)),
            _ => Err(err()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ChannelSet, DeviceState};

    #[test]
    fn test_parse_names() {
        assert_eq!("fan1_input".parse(), Ok(Sensor::Fan(0, FanAttr::Input)));
        assert_eq!("fan3_label".parse(), Ok(Sensor::Fan(2, FanAttr::Label)));
        assert_eq!("FAN6_TARGET".parse(), Ok(Sensor::Fan(5, FanAttr::Target)));
        assert_eq!("pwm2".parse(), Ok(Sensor::Pwm(1)));
        assert_eq!("temp1_input".parse(), Ok(Sensor::Temperature(0)));
        assert_eq!("in0_input".parse(), Ok(Sensor::Voltage(0)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("fan0_input".parse::<Sensor>().is_err());
        assert!("fan1_speed".parse::<Sensor>().is_err());
        assert!("pwm".parse::<Sensor>().is_err());
        assert!("humidity1_input".parse::<Sensor>().is_err());
    }

    #[test]
    fn test_display_matches_parse() {
        for sensor in Sensor::all(&ChannelLimits::default()) {
            assert_eq!(sensor.to_string().parse::<Sensor>(), Ok(sensor));
        }
    }

    #[test]
    fn test_all_counts() {
        let limits = ChannelLimits::default();
        // 2 temps + 6 fans x 3 + 6 pwm + 3 in
        assert_eq!(Sensor::all(&limits).len(), 2 + 18 + 6 + 3);
    }

    #[test]
    fn test_visibility_follows_connectivity() {
        let mut state = DeviceState::new(ChannelLimits::default());
        state.mark_fan_connected(0);
        state.mark_fan_connected(2);

        assert_eq!(Sensor::Fan(0, FanAttr::Input).visibility(&state), Access::ReadOnly);
        assert_eq!(Sensor::Fan(0, FanAttr::Label).visibility(&state), Access::ReadOnly);
        assert_eq!(Sensor::Fan(2, FanAttr::Target).visibility(&state), Access::ReadWrite);
        assert_eq!(Sensor::Pwm(2).visibility(&state), Access::ReadWrite);
        assert_eq!(Sensor::Fan(1, FanAttr::Input).visibility(&state), Access::Hidden);
        assert_eq!(Sensor::Pwm(1).visibility(&state), Access::Hidden);
        assert_eq!(Sensor::Temperature(0).visibility(&state), Access::Hidden);
        assert_eq!(Sensor::Voltage(0).visibility(&state), Access::Hidden);
        assert_eq!(Sensor::Fan(9, FanAttr::Input).visibility(&state), Access::Hidden);
    }

    #[test]
    fn test_connected_temperature_is_read_only() {
        let mut state = DeviceState::new(ChannelLimits::default());
        state.temps = [1].into_iter().collect::<ChannelSet>();
        assert_eq!(Sensor::Temperature(1).visibility(&state), Access::ReadOnly);
        assert_eq!(Access::ReadOnly.mode(), 0o444);
        assert_eq!(Access::ReadWrite.mode(), 0o644);
    }
}
