//! Decoders for endpoint payloads and command replies
//!
//! All endpoint payloads share a layout: a channel count at byte 5 and
//! per-channel records from byte 6.

use tracing::{debug, warn};
use zerocopy::byteorder::little_endian::{I16, U16};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

use crate::error::HwmonError;
use crate::state::{ChannelSet, FirmwareVersion};

/// Channel count position in fan and temperature payloads
pub const COUNT_INDEX: usize = 5;
/// First per-channel record
pub const DATA_OFFSET: usize = 6;
/// Inventory state of a connected fan
pub const FAN_STATE_OK: u8 = 0x07;

/// Device duty scale (percent)
const DUTY_MAX: u32 = 100;
/// Host PWM scale
const PWM_MAX: u32 = 255;

/// GET_FIRMWARE reply
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct FirmwareReply {
    status: u8,
    _echo: [u8; 2],
    major: u8,
    minor: u8,
    patch: U16,
}

/// One channel record of the fan-pwm endpoint
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct PwmRecord {
    channel: u8,
    _mode: u8,
    duty: u8,
    _reserved: u8,
}

/// Result of a fan inventory read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanInventory {
    /// Ports the controller claims to have
    pub count: u8,
    /// Ports reporting a connected fan
    pub connected: ChannelSet,
}

/// Integer division rounding half away from zero, for non-negative operands
fn div_round_closest(n: u32, d: u32) -> u32 {
    (n + d / 2) / d
}

/// Host PWM (0-255) to device duty (0-100)
pub fn pwm_to_duty(pwm: u8) -> u8 {
    div_round_closest(u32::from(pwm) * DUTY_MAX, PWM_MAX) as u8
}

/// Device duty to host PWM. Out-of-range duty bytes are scaled as-is.
pub fn duty_to_pwm(duty: u8) -> u16 {
    div_round_closest(u32::from(duty) * PWM_MAX, DUTY_MAX) as u16
}

fn channel_count(data: &[u8]) -> usize {
    data.get(COUNT_INDEX).copied().unwrap_or(0) as usize
}

/// Reject channels the reply does not cover
fn check_channel(data: &[u8], channel: usize, max_fans: usize) -> Result<(), HwmonError> {
    let available = channel_count(data).min(max_fans);
    if channel >= available {
        debug!("invalid fan channel {} ({} available)", channel, available);
        return Err(HwmonError::InvalidParameter(format!(
            "fan channel {channel} out of range ({available} available)"
        )));
    }
    Ok(())
}

/// Decode the fan inventory: only state 0x07 marks a fan connected
pub fn fan_inventory(data: &[u8], max_fans: usize) -> FanInventory {
    let count = data.get(COUNT_INDEX).copied().unwrap_or(0);
    let connected = (0..(count as usize).min(max_fans))
        .filter(|&ch| data.get(DATA_OFFSET + ch) == Some(&FAN_STATE_OK))
        .collect();
    FanInventory { count, connected }
}

/// Decode one fan's speed from the fan-state payload
pub fn fan_rpm(data: &[u8], channel: usize, max_fans: usize) -> Result<i16, HwmonError> {
    check_channel(data, channel, max_fans)?;
    let at = DATA_OFFSET + channel * 2;
    let rpm = data
        .get(at..)
        .and_then(|rest| I16::read_from_prefix(rest).ok())
        .map(|(rpm, _)| rpm.get())
        .ok_or_else(|| HwmonError::UnexpectedResponse(format!("no rpm record at {at}")))?;
    debug!("fan{} rpm {}", channel, rpm);
    Ok(rpm)
}

/// Decode one fan's PWM (0-255 scale) from the fan-pwm payload
pub fn fan_pwm(data: &[u8], channel: usize, max_fans: usize) -> Result<u16, HwmonError> {
    check_channel(data, channel, max_fans)?;
    let at = DATA_OFFSET + channel * 4;
    let (record, _) = data
        .get(at..)
        .and_then(|rest| PwmRecord::read_from_prefix(rest).ok())
        .ok_or_else(|| HwmonError::UnexpectedResponse(format!("no pwm record at {at}")))?;

    if record.channel as usize != channel {
        warn!(
            "invalid fan id {} in response for channel {}",
            record.channel, channel
        );
        return Err(HwmonError::UnexpectedResponse(format!(
            "fan id {} in response for channel {}",
            record.channel, channel
        )));
    }

    let pwm = duty_to_pwm(record.duty);
    debug!("fan{} duty {}% -> pwm {}", channel, record.duty, pwm);
    Ok(pwm)
}

/// Decode a GET_FIRMWARE reply
pub fn firmware_version(reply: &[u8]) -> Result<FirmwareVersion, HwmonError> {
    let (fw, _) = FirmwareReply::read_from_prefix(reply)
        .map_err(|_| HwmonError::UnexpectedResponse("firmware reply too short".into()))?;
    debug!("firmware reply status {}", fw.status);
    Ok(FirmwareVersion {
        major: fw.major,
        minor: fw.minor,
        patch: fw.patch.get(),
    })
}

/// Decode the temperature inventory.
///
/// The probe state encoding of this endpoint is not understood, so no probe
/// is ever reported connected.
pub fn temperature_inventory(data: &[u8], max_temps: usize) -> Result<ChannelSet, HwmonError> {
    let count = channel_count(data).min(max_temps);
    debug!(
        "temperature inventory: {} probes, states {:02x?}",
        count,
        data.get(DATA_OFFSET..DATA_OFFSET + count).unwrap_or(&[])
    );
    Err(HwmonError::NotSupported(
        "temperature probe states cannot be decoded".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NUM_FANS;

    fn payload(count: u8, records: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 384];
        data[COUNT_INDEX] = count;
        data[DATA_OFFSET..DATA_OFFSET + records.len()].copy_from_slice(records);
        data
    }

    #[test]
    fn test_inventory_marks_only_state_ok() {
        let inv = fan_inventory(&payload(3, &[0x07, 0x00, 0x07]), NUM_FANS);
        assert_eq!(inv.count, 3);
        assert_eq!(inv.connected.iter().collect::<Vec<_>>(), vec![0, 2]);

        let inv = fan_inventory(&payload(2, &[0x06, 0x08]), NUM_FANS);
        assert!(inv.connected.is_empty());
    }

    #[test]
    fn test_inventory_ignores_channels_beyond_count_and_limit() {
        let inv = fan_inventory(&payload(2, &[0x07, 0x07, 0x07]), NUM_FANS);
        assert_eq!(inv.connected.iter().collect::<Vec<_>>(), vec![0, 1]);

        let inv = fan_inventory(&payload(8, &[0x07; 8]), NUM_FANS);
        assert_eq!(inv.connected.len(), NUM_FANS);
    }

    #[test]
    fn test_rpm_little_endian_signed() {
        let data = payload(3, &[0xd2, 0x04, 0xff, 0xff, 0x00, 0x80]);
        assert_eq!(fan_rpm(&data, 0, NUM_FANS).unwrap(), 1234);
        assert_eq!(fan_rpm(&data, 1, NUM_FANS).unwrap(), -1);
        assert_eq!(fan_rpm(&data, 2, NUM_FANS).unwrap(), i16::MIN);
    }

    #[test]
    fn test_rpm_channel_out_of_range() {
        let data = payload(2, &[]);
        let err = fan_rpm(&data, 2, NUM_FANS).unwrap_err();
        assert!(matches!(err, HwmonError::InvalidParameter(_)));
        // device count above the limit is capped by the limit
        let data = payload(8, &[]);
        assert!(fan_rpm(&data, NUM_FANS, NUM_FANS).is_err());
    }

    #[test]
    fn test_pwm_decode() {
        let data = payload(2, &[0, 0, 50, 0, 1, 0, 100, 0]);
        assert_eq!(fan_pwm(&data, 0, NUM_FANS).unwrap(), 128);
        assert_eq!(fan_pwm(&data, 1, NUM_FANS).unwrap(), 255);
    }

    #[test]
    fn test_pwm_echo_mismatch() {
        let data = payload(2, &[0, 0, 50, 0, 0, 0, 50, 0]);
        let err = fan_pwm(&data, 1, NUM_FANS).unwrap_err();
        assert!(matches!(err, HwmonError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_pwm_duty_above_hundred_not_clamped() {
        let data = payload(1, &[0, 0, 200, 0]);
        assert_eq!(fan_pwm(&data, 0, NUM_FANS).unwrap(), 510);
    }

    #[test]
    fn test_pwm_round_trip_within_one() {
        for pwm in 0..=255u8 {
            let back = duty_to_pwm(pwm_to_duty(pwm));
            assert!(
                (i32::from(back) - i32::from(pwm)).abs() <= 1,
                "pwm {pwm} came back as {back}"
            );
        }
    }

    #[test]
    fn test_pwm_scaling_boundaries() {
        assert_eq!(pwm_to_duty(0), 0);
        assert_eq!(pwm_to_duty(1), 0);
        assert_eq!(pwm_to_duty(127), 50);
        assert_eq!(pwm_to_duty(128), 50);
        assert_eq!(pwm_to_duty(254), 100);
        assert_eq!(pwm_to_duty(255), 100);
        assert_eq!(duty_to_pwm(0), 0);
        assert_eq!(duty_to_pwm(50), 128);
        assert_eq!(duty_to_pwm(100), 255);
    }

    #[test]
    fn test_firmware_version() {
        let mut reply = vec![0u8; 384];
        reply[1..7].copy_from_slice(&[0x02, 0x13, 2, 10, 0xdb, 0x00]);
        let fw = firmware_version(&reply).unwrap();
        assert_eq!(fw.to_string(), "2.10.219");
    }

    #[test]
    fn test_firmware_reply_too_short() {
        assert!(firmware_version(&[0, 2, 0x13]).is_err());
    }

    #[test]
    fn test_temperature_inventory_unsupported() {
        let err = temperature_inventory(&payload(2, &[1, 1]), 2).unwrap_err();
        assert!(matches!(err, HwmonError::NotSupported(_)));
    }
}
