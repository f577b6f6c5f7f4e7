//! Protocol constants and frame builders for Commander Core XT communication
//!
//! Every command is a fixed 385-byte output report:
//!
//! ```text
//! [0x00 0x08] [command template...] [endpoint?] [write sub-frame?] [zero padding]
//! ```
//!
//! Replies are fixed 384-byte input reports whose first byte is a status code.

use std::fmt;
use std::str::FromStr;

use zerocopy::{Immutable, IntoBytes, KnownLayout};

use crate::error::TransportError;

/// Outgoing report size (includes the leading report ID byte)
pub const OUT_FRAME_SIZE: usize = 385;
/// Incoming report size
pub const IN_FRAME_SIZE: usize = 384;

/// Constant prefix of every outgoing frame
pub const CMD_HEADER: [u8; 2] = [0x00, 0x08];
pub const CMD_HEADER_SIZE: usize = CMD_HEADER.len();
/// Sub-header placed between the write template and the data-type tag
pub const WRITE_HEADER_SIZE: usize = 4;
/// Size of a data-type tag
pub const DATA_TYPE_SIZE: usize = 2;

/// Largest payload a single write frame can carry.
///
/// Bounded by the one-byte length field (tag + data) rather than the frame size.
pub const MAX_WRITE_PAYLOAD: usize = u8::MAX as usize - DATA_TYPE_SIZE;

/// Exchange timing
pub mod timing {
    /// How long an exchange waits for its reply (ms)
    pub const REPLY_TIMEOUT_MS: u64 = 300;
    /// Read timeout of the input reader loop (ms); only bounds shutdown latency
    pub const READER_POLL_MS: i32 = 5;
    /// Back-off after a failed input read (ms)
    pub const READER_ERROR_SLEEP_MS: u64 = 100;
}

/// Device reply status codes (byte 0 of every input report)
pub mod status {
    pub const OK: u8 = 0x00;
    /// Called an invalid command
    pub const INVALID_COMMAND: u8 = 0x01;
    /// Query with invalid arguments
    pub const INVALID_ARGUMENTS: u8 = 0x10;
    /// Requested data of a disconnected sensor
    pub const DISCONNECTED: u8 = 0x11;
    /// Requested PWM of a channel that is not PWM controlled
    pub const NOT_PWM: u8 = 0x12;
}

/// Data-type tags for write payloads
pub mod data_type {
    /// Set fan speed
    pub const SET_SPEED: [u8; 2] = [0x07, 0x00];
}

/// Map a reply status byte to a result
pub fn check_status(code: u8) -> Result<(), TransportError> {
    match code {
        status::OK => Ok(()),
        status::INVALID_COMMAND => Err(TransportError::Unsupported),
        status::INVALID_ARGUMENTS => Err(TransportError::InvalidArgument(
            "device rejected query parameters".into(),
        )),
        status::DISCONNECTED | status::NOT_PWM => Err(TransportError::NoData),
        other => {
            tracing::debug!("unknown device response error: 0x{:02X}", other);
            Err(TransportError::DeviceStatus(other))
        }
    }
}

// ---------------------------------------------------------------------------
// Command templates
// ---------------------------------------------------------------------------

/// An immutable command template (opcode, sub-opcode and fixed parameters)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Command {
    name: &'static str,
    bytes: &'static [u8],
}

impl Command {
    /// Firmware version: reply carries major, minor and a 16-bit patch
    pub const GET_FIRMWARE: Command = Command::new("GET_FIRMWARE", &[0x02, 0x13]);
    /// Hand fan control back to the controller's own curves
    pub const HARDWARE_MODE: Command = Command::new("HARDWARE_MODE", &[0x01, 0x03, 0x00, 0x01]);
    /// Required before the host may talk to the controller
    pub const SOFTWARE_MODE: Command = Command::new("SOFTWARE_MODE", &[0x01, 0x03, 0x00, 0x02]);
    pub const OPEN_ENDPOINT: Command = Command::new("OPEN_ENDPOINT", &[0x0d, 0x01]);
    pub const CLOSE_ENDPOINT: Command = Command::new("CLOSE_ENDPOINT", &[0x05, 0x01, 0x01]);
    pub const WRITE: Command = Command::new("WRITE", &[0x06, 0x01]);
    pub const READ: Command = Command::new("READ", &[0x08, 0x01]);

    /// Every known template
    pub const ALL: [Command; 7] = [
        Self::GET_FIRMWARE,
        Self::HARDWARE_MODE,
        Self::SOFTWARE_MODE,
        Self::OPEN_ENDPOINT,
        Self::CLOSE_ENDPOINT,
        Self::WRITE,
        Self::READ,
    ];

    const fn new(name: &'static str, bytes: &'static [u8]) -> Self {
        Self { name, bytes }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bytes(&self) -> &'static [u8] {
        self.bytes
    }

    /// Whether this command is followed by an endpoint selector
    pub fn takes_endpoint(&self) -> bool {
        *self == Self::OPEN_ENDPOINT || *self == Self::CLOSE_ENDPOINT || *self == Self::READ
    }

    /// Identify the template at the start of an outgoing frame.
    ///
    /// Longest match wins (hardware/software mode share their first bytes).
    pub fn identify(frame: &[u8]) -> Option<Command> {
        let body = frame.get(CMD_HEADER_SIZE..)?;
        Self::ALL
            .iter()
            .filter(|c| body.starts_with(c.bytes))
            .max_by_key(|c| c.bytes.len())
            .copied()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02X?}", self.name, self.bytes)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Device-side virtual channels used to scope multi-step transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Endpoint {
    /// Speed of all connected fans
    FanState = 0x17,
    /// PWM of one or multiple fans by id
    FanPwm = 0x18,
    /// Number of supported fans and the connection state of each
    FanInventory = 0x1a,
    /// Number of supported temperature sensors and their readings
    TemperatureInventory = 0x21,
}

impl Endpoint {
    pub const ALL: [Endpoint; 4] = [
        Endpoint::FanState,
        Endpoint::FanPwm,
        Endpoint::FanInventory,
        Endpoint::TemperatureInventory,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.id() == v)
    }

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::FanState => "fan-state",
            Endpoint::FanPwm => "fan-pwm",
            Endpoint::FanInventory => "fan-inventory",
            Endpoint::TemperatureInventory => "temperature-inventory",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02x})", self.name(), self.id())
    }
}

impl FromStr for Endpoint {
    type Err = String;

    /// Accepts a name (`fan-state`, `fans`, `temps`, ...) or a hex id (`0x17`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "fan-state" | "state" | "rpm" => return Ok(Endpoint::FanState),
            "fan-pwm" | "pwm" => return Ok(Endpoint::FanPwm),
            "fan-inventory" | "fans" => return Ok(Endpoint::FanInventory),
            "temperature-inventory" | "temperatures" | "temps" => {
                return Ok(Endpoint::TemperatureInventory)
            }
            _ => {}
        }
        let hex = lower.strip_prefix("0x").unwrap_or(&lower);
        u8::from_str_radix(hex, 16)
            .ok()
            .and_then(Endpoint::from_u8)
            .ok_or_else(|| {
                format!("unknown endpoint: \"{s}\". Use fan-state, fan-pwm, fans, temps or 0x17/0x18/0x1a/0x21")
            })
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Sub-header of a write frame
#[derive(Debug, Clone, Copy, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
struct WriteHeader {
    /// Length of data-type tag plus data
    length: u8,
    _reserved: [u8; 3],
}

/// A fully encoded outgoing frame
#[derive(Clone)]
pub struct OutFrame {
    bytes: [u8; OUT_FRAME_SIZE],
    len: usize,
}

impl OutFrame {
    /// Encode a bare command: header, then the template, zero padded.
    pub fn command(cmd: Command) -> Self {
        let mut bytes = [0u8; OUT_FRAME_SIZE];
        bytes[..CMD_HEADER_SIZE].copy_from_slice(&CMD_HEADER);
        let len = CMD_HEADER_SIZE + cmd.bytes.len();
        bytes[CMD_HEADER_SIZE..len].copy_from_slice(cmd.bytes);
        Self { bytes, len }
    }

    /// Encode a command followed by a single endpoint selector byte
    pub fn endpoint_command(cmd: Command, endpoint: Endpoint) -> Self {
        let mut frame = Self::command(cmd);
        frame.bytes[frame.len] = endpoint.id();
        frame.len += 1;
        frame
    }

    /// Encode a write frame for the currently opened endpoint:
    ///
    /// `[header] [WRITE] [len 0 0 0] [tag tag] [data...]` where `len` counts tag and data.
    pub fn write(data_type: [u8; DATA_TYPE_SIZE], data: &[u8]) -> Result<Self, TransportError> {
        if data.len() > MAX_WRITE_PAYLOAD {
            return Err(TransportError::PayloadTooLarge {
                len: data.len(),
                max: MAX_WRITE_PAYLOAD,
            });
        }

        let mut frame = Self::command(Command::WRITE);
        let header = WriteHeader {
            length: (DATA_TYPE_SIZE + data.len()) as u8,
            _reserved: [0; 3],
        };
        frame.push(header.as_bytes());
        frame.push(&data_type);
        frame.push(data);
        Ok(frame)
    }

    fn push(&mut self, src: &[u8]) {
        let end = self.len + src.len();
        self.bytes[self.len..end].copy_from_slice(src);
        self.len = end;
    }

    /// Number of meaningful (non-padding) bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The full fixed-size frame, padding included
    pub fn as_bytes(&self) -> &[u8; OUT_FRAME_SIZE] {
        &self.bytes
    }

    /// Meaningful prefix, for logging
    pub fn content(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Default for OutFrame {
    fn default() -> Self {
        Self {
            bytes: [0u8; OUT_FRAME_SIZE],
            len: 0,
        }
    }
}

impl fmt::Debug for OutFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutFrame({:02X?})", self.content())
    }
}

/// A captured input report
#[derive(Clone, PartialEq, Eq)]
pub struct InFrame {
    bytes: [u8; IN_FRAME_SIZE],
    /// Length the substrate actually delivered (may exceed the buffer)
    len: usize,
}

impl InFrame {
    /// Copy up to `IN_FRAME_SIZE` bytes of a raw report, recording its real length
    pub fn capture(report: &[u8]) -> Self {
        let mut bytes = [0u8; IN_FRAME_SIZE];
        let n = report.len().min(IN_FRAME_SIZE);
        bytes[..n].copy_from_slice(&report[..n]);
        Self {
            bytes,
            len: report.len(),
        }
    }

    pub fn status(&self) -> u8 {
        self.bytes[0]
    }

    pub fn received_len(&self) -> usize {
        self.len
    }

    /// Only replies of exactly `IN_FRAME_SIZE` bytes are valid
    pub fn is_complete(&self) -> bool {
        self.len == IN_FRAME_SIZE
    }

    pub fn as_bytes(&self) -> &[u8; IN_FRAME_SIZE] {
        &self.bytes
    }
}

impl Default for InFrame {
    fn default() -> Self {
        Self {
            bytes: [0u8; IN_FRAME_SIZE],
            len: 0,
        }
    }
}

impl fmt::Debug for InFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self.len.min(16);
        write!(f, "InFrame(len={}, {:02X?}..)", self.len, &self.bytes[..shown])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_encodes_to_fixed_frame() {
        for cmd in Command::ALL {
            let frame = OutFrame::command(cmd);
            let bytes = frame.as_bytes();
            assert_eq!(bytes.len(), OUT_FRAME_SIZE);
            assert_eq!(&bytes[..2], &[0x00, 0x08]);
            assert_eq!(&bytes[2..2 + cmd.bytes().len()], cmd.bytes());
            assert!(bytes[2 + cmd.bytes().len()..].iter().all(|&b| b == 0));
            assert_eq!(frame.len(), 2 + cmd.bytes().len());
        }
    }

    #[test]
    fn endpoint_byte_follows_template() {
        for cmd in Command::ALL {
            for ep in Endpoint::ALL {
                let frame = OutFrame::endpoint_command(cmd, ep);
                let bytes = frame.as_bytes();
                let at = 2 + cmd.bytes().len();
                assert_eq!(&bytes[2..at], cmd.bytes());
                assert_eq!(bytes[at], ep.id());
                assert!(bytes[at + 1..].iter().all(|&b| b == 0));
                assert_eq!(frame.len(), at + 1);
            }
        }
    }

    #[test]
    fn close_endpoint_frame_bytes() {
        let frame = OutFrame::endpoint_command(Command::CLOSE_ENDPOINT, Endpoint::FanPwm);
        assert_eq!(frame.content(), &[0x00, 0x08, 0x05, 0x01, 0x01, 0x18]);
    }

    #[test]
    fn write_frame_layout() {
        let payload = [1, 2, 0, 50, 0];
        let frame = OutFrame::write(data_type::SET_SPEED, &payload).unwrap();
        assert_eq!(
            frame.content(),
            &[0x00, 0x08, 0x06, 0x01, 7, 0, 0, 0, 0x07, 0x00, 1, 2, 0, 50, 0]
        );
        assert!(frame.as_bytes()[frame.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn write_frame_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_WRITE_PAYLOAD + 1];
        let err = OutFrame::write(data_type::SET_SPEED, &payload).unwrap_err();
        assert!(matches!(err, TransportError::PayloadTooLarge { .. }));

        let payload = vec![0xAB; MAX_WRITE_PAYLOAD];
        let frame = OutFrame::write(data_type::SET_SPEED, &payload).unwrap();
        assert_eq!(frame.as_bytes()[4], u8::MAX);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(check_status(0x00), Ok(()));
        assert_eq!(check_status(0x01), Err(TransportError::Unsupported));
        assert!(matches!(
            check_status(0x10),
            Err(TransportError::InvalidArgument(_))
        ));
        assert_eq!(check_status(0x11), Err(TransportError::NoData));
        assert_eq!(check_status(0x12), Err(TransportError::NoData));
        assert_eq!(check_status(0x02), Err(TransportError::DeviceStatus(0x02)));
        assert_eq!(check_status(0xFF), Err(TransportError::DeviceStatus(0xFF)));
    }

    #[test]
    fn identify_prefers_longest_template() {
        let frame = OutFrame::command(Command::SOFTWARE_MODE);
        assert_eq!(Command::identify(frame.as_bytes()), Some(Command::SOFTWARE_MODE));
        let frame = OutFrame::endpoint_command(Command::READ, Endpoint::FanState);
        assert_eq!(Command::identify(frame.as_bytes()), Some(Command::READ));
        assert_eq!(Command::identify(&[0x00, 0x08, 0x7F]), None);
    }

    #[test]
    fn in_frame_records_real_length() {
        let short = InFrame::capture(&[0x00, 0x01, 0x02]);
        assert_eq!(short.received_len(), 3);
        assert!(!short.is_complete());

        let long = InFrame::capture(&[0x11; IN_FRAME_SIZE + 10]);
        assert_eq!(long.received_len(), IN_FRAME_SIZE + 10);
        assert!(!long.is_complete());
        assert_eq!(long.status(), 0x11);

        let exact = InFrame::capture(&[0u8; IN_FRAME_SIZE]);
        assert!(exact.is_complete());
    }

    #[test]
    fn endpoint_parse() {
        assert_eq!("fan-state".parse::<Endpoint>(), Ok(Endpoint::FanState));
        assert_eq!("0x18".parse::<Endpoint>(), Ok(Endpoint::FanPwm));
        assert_eq!("1A".parse::<Endpoint>(), Ok(Endpoint::FanInventory));
        assert_eq!("temps".parse::<Endpoint>(), Ok(Endpoint::TemperatureInventory));
        assert!("0x99".parse::<Endpoint>().is_err());
    }
}
