//! In-memory Commander Core XT for tests
//!
//! `MockController` implements `ReportSink` and answers every frame the way
//! the controller does: mode switches, endpoint open/close bookkeeping,
//! endpoint reads built from its simulated fan state and PWM writes that
//! update it. Replies are delivered from a spawned task through the
//! session's `ReplyCapture`, like the HID reader thread would.
//!
//! Faults can be queued per command to script timeouts, bad status codes,
//! wrong reply lengths and send failures.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::TransportError;
use crate::printer::describe_frame;
use crate::protocol::{
    data_type, status, Command, Endpoint, CMD_HEADER_SIZE, DATA_TYPE_SIZE, IN_FRAME_SIZE,
    WRITE_HEADER_SIZE,
};
use crate::reply::ReplyCapture;
use crate::session::{Session, SessionConfig};
use crate::types::DeviceInfo;
use crate::ReportSink;

/// Physical fan headers on the simulated board
pub const MOCK_FAN_PORTS: usize = 8;

const COUNT_INDEX: usize = 5;
const DATA_OFFSET: usize = 6;
const FAN_STATE_OK: u8 = 0x07;

/// A scripted misbehaviour for the next matching frame
#[derive(Debug, Clone)]
pub enum Fault {
    /// Swallow the frame, never reply
    NoReply,
    /// Reply with this status code instead of success
    Status(u8),
    /// Reply with this many bytes (zero padded or truncated)
    ReplyLength(usize),
    /// Reply with `len` bytes whose first byte is `status`
    Reply { status: u8, len: usize },
    /// Deliver the reply twice
    DuplicateReply,
    /// Fail the send itself
    SendError(TransportError),
}

struct PendingFault {
    command: Command,
    endpoint: Option<Endpoint>,
    /// Matching frames to let through before firing
    skip: usize,
    fault: Fault,
}

struct MockState {
    frames: Vec<Vec<u8>>,
    software_mode: bool,
    open_endpoint: Option<Endpoint>,
    fan_count: u8,
    fan_states: [u8; MOCK_FAN_PORTS],
    rpm: [i16; MOCK_FAN_PORTS],
    duty: [u8; MOCK_FAN_PORTS],
    temp_count: u8,
    firmware: (u8, u8, u16),
    payload_overrides: Vec<(Endpoint, Vec<u8>)>,
    faults: Vec<PendingFault>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            software_mode: false,
            open_endpoint: None,
            fan_count: 6,
            fan_states: [0; MOCK_FAN_PORTS],
            rpm: [0; MOCK_FAN_PORTS],
            duty: [0; MOCK_FAN_PORTS],
            temp_count: 2,
            firmware: (1, 2, 300),
            payload_overrides: Vec::new(),
            faults: Vec::new(),
        }
    }
}

/// Simulated controller behind the `ReportSink` trait
pub struct MockController {
    state: Mutex<MockState>,
    capture: Mutex<Option<ReplyCapture>>,
    info: DeviceInfo,
    /// Set while a reply is outstanding
    in_flight: Arc<AtomicBool>,
    /// Frames sent while a previous reply was still outstanding
    interleaved: AtomicUsize,
}

impl Default for MockController {
    fn default() -> Self {
        Self::new()
    }
}

impl MockController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            capture: Mutex::new(None),
            info: DeviceInfo {
                vid: crate::VENDOR_ID,
                pid: crate::COMMANDER_CORE_XT_PID,
                device_path: "mock".into(),
                interface: 0,
                serial: Some("MOCK0001".into()),
                product_name: Some("Commander Core XT (mock)".into()),
            },
            in_flight: Arc::new(AtomicBool::new(false)),
            interleaved: AtomicUsize::new(0),
        }
    }

    /// Route replies to `capture`
    pub fn attach(&self, capture: ReplyCapture) {
        *self.capture.lock() = Some(capture);
    }

    /// Build a session talking to this controller
    pub fn session(self: &Arc<Self>, config: SessionConfig) -> Session {
        let session = Session::new(Arc::clone(self) as Arc<dyn ReportSink>, config);
        self.attach(session.capture());
        session
    }

    // --- simulated hardware ---

    /// Set the reported port count and per-port connection states
    pub fn set_fans(&self, count: u8, states: &[u8]) {
        let mut st = self.state.lock();
        st.fan_count = count;
        st.fan_states = [0; MOCK_FAN_PORTS];
        for (slot, &s) in st.fan_states.iter_mut().zip(states) {
            *slot = s;
        }
    }

    /// Mark `channels` connected out of `count` ports
    pub fn connect_fans(&self, count: u8, channels: &[usize]) {
        let mut states = [0u8; MOCK_FAN_PORTS];
        for &ch in channels {
            states[ch] = FAN_STATE_OK;
        }
        self.set_fans(count, &states);
    }

    pub fn set_rpm(&self, channel: usize, rpm: i16) {
        self.state.lock().rpm[channel] = rpm;
    }

    /// Set a channel's duty in device units (0-100)
    pub fn set_duty(&self, channel: usize, duty: u8) {
        self.state.lock().duty[channel] = duty;
    }

    pub fn duty(&self, channel: usize) -> u8 {
        self.state.lock().duty[channel]
    }

    pub fn set_firmware(&self, major: u8, minor: u8, patch: u16) {
        self.state.lock().firmware = (major, minor, patch);
    }

    /// Replace the data part (from offset 5) of every read of `endpoint`
    pub fn override_payload(&self, endpoint: Endpoint, payload: Vec<u8>) {
        let mut st = self.state.lock();
        st.payload_overrides.retain(|(ep, _)| *ep != endpoint);
        st.payload_overrides.push((endpoint, payload));
    }

    pub fn software_mode(&self) -> bool {
        self.state.lock().software_mode
    }

    pub fn open_endpoint(&self) -> Option<Endpoint> {
        self.state.lock().open_endpoint
    }

    // --- fault injection ---

    /// Misbehave on the next frame carrying `command`
    pub fn inject(&self, command: Command, fault: Fault) {
        self.push_fault(command, None, 0, fault);
    }

    /// Misbehave on the next frame carrying `command` for `endpoint`
    pub fn inject_for(&self, command: Command, endpoint: Endpoint, fault: Fault) {
        self.push_fault(command, Some(endpoint), 0, fault);
    }

    /// Let `skip` frames carrying `command` through, then misbehave on the next
    pub fn inject_after(&self, command: Command, skip: usize, fault: Fault) {
        self.push_fault(command, None, skip, fault);
    }

    fn push_fault(&self, command: Command, endpoint: Option<Endpoint>, skip: usize, fault: Fault) {
        self.state.lock().faults.push(PendingFault {
            command,
            endpoint,
            skip,
            fault,
        });
    }

    // --- inspection ---

    /// Every frame received, full size
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().frames.clone()
    }

    /// Decoded description of every frame received
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .frames
            .iter()
            .map(|f| describe_frame(f))
            .collect()
    }

    pub fn clear_frames(&self) {
        self.state.lock().frames.clear();
    }

    /// Frames that arrived while an earlier reply was still outstanding
    pub fn interleaved(&self) -> usize {
        self.interleaved.load(Ordering::SeqCst)
    }

    // --- device logic ---

    fn take_fault(st: &mut MockState, cmd: Option<Command>, endpoint: Option<Endpoint>) -> Option<Fault> {
        let cmd = cmd?;
        let pos = st.faults.iter().position(|f| {
            f.command == cmd && (f.endpoint.is_none() || f.endpoint == endpoint)
        })?;
        if st.faults[pos].skip > 0 {
            st.faults[pos].skip -= 1;
            return None;
        }
        Some(st.faults.remove(pos).fault)
    }

    /// Compute the reply to one frame and update device state
    fn respond(st: &mut MockState, cmd: Option<Command>, endpoint: Option<Endpoint>, frame: &[u8]) -> Vec<u8> {
        let mut reply = vec![0u8; IN_FRAME_SIZE];
        let Some(cmd) = cmd else {
            reply[0] = status::INVALID_COMMAND;
            return reply;
        };
        reply[1..3].copy_from_slice(&cmd.bytes()[..2]);

        if cmd == Command::GET_FIRMWARE {
            let (major, minor, patch) = st.firmware;
            reply[3] = major;
            reply[4] = minor;
            reply[5..7].copy_from_slice(&patch.to_le_bytes());
        } else if cmd == Command::SOFTWARE_MODE {
            st.software_mode = true;
        } else if cmd == Command::HARDWARE_MODE {
            st.software_mode = false;
            st.open_endpoint = None;
        } else if cmd == Command::CLOSE_ENDPOINT {
            st.open_endpoint = None;
        } else if cmd == Command::OPEN_ENDPOINT {
            match endpoint {
                Some(ep) if st.open_endpoint.is_none() => st.open_endpoint = Some(ep),
                _ => reply[0] = status::INVALID_ARGUMENTS,
            }
        } else if cmd == Command::READ {
            if endpoint.is_none() || endpoint != st.open_endpoint {
                reply[0] = status::INVALID_ARGUMENTS;
            } else if let Some(ep) = endpoint {
                Self::fill_read(st, ep, &mut reply);
            }
        } else if cmd == Command::WRITE {
            reply[0] = Self::apply_write(st, frame);
        }
        reply
    }

    fn fill_read(st: &MockState, endpoint: Endpoint, reply: &mut [u8]) {
        if let Some((_, payload)) = st.payload_overrides.iter().find(|(ep, _)| *ep == endpoint) {
            let end = (COUNT_INDEX + payload.len()).min(reply.len());
            reply[COUNT_INDEX..end].copy_from_slice(&payload[..end - COUNT_INDEX]);
            return;
        }

        let ports = (st.fan_count as usize).min(MOCK_FAN_PORTS);
        match endpoint {
            Endpoint::FanInventory => {
                reply[COUNT_INDEX] = st.fan_count;
                reply[DATA_OFFSET..DATA_OFFSET + ports].copy_from_slice(&st.fan_states[..ports]);
            }
            Endpoint::FanState => {
                reply[COUNT_INDEX] = st.fan_count;
                for ch in 0..ports {
                    let i = DATA_OFFSET + ch * 2;
                    reply[i..i + 2].copy_from_slice(&st.rpm[ch].to_le_bytes());
                }
            }
            Endpoint::FanPwm => {
                reply[COUNT_INDEX] = st.fan_count;
                for ch in 0..ports {
                    let i = DATA_OFFSET + ch * 4;
                    reply[i] = ch as u8;
                    reply[i + 2] = st.duty[ch];
                }
            }
            Endpoint::TemperatureInventory => {
                reply[COUNT_INDEX] = st.temp_count;
            }
        }
    }

    /// Apply a write frame to the open endpoint; returns the status code
    fn apply_write(st: &mut MockState, frame: &[u8]) -> u8 {
        let sub = CMD_HEADER_SIZE + Command::WRITE.bytes().len();
        let tag_at = sub + WRITE_HEADER_SIZE;
        let data_at = tag_at + DATA_TYPE_SIZE;
        let Some(&length) = frame.get(sub) else {
            return status::INVALID_ARGUMENTS;
        };
        let data_len = (length as usize).saturating_sub(DATA_TYPE_SIZE);
        let (Some(tag), Some(data)) = (
            frame.get(tag_at..data_at),
            frame.get(data_at..data_at + data_len),
        ) else {
            return status::INVALID_ARGUMENTS;
        };

        if st.open_endpoint != Some(Endpoint::FanPwm) || tag != data_type::SET_SPEED {
            return status::INVALID_ARGUMENTS;
        }

        // {count, then count x {id, mode, duty, 0}}
        let Some((&count, entries)) = data.split_first() else {
            return status::INVALID_ARGUMENTS;
        };
        for entry in entries.chunks_exact(4).take(count as usize) {
            let id = entry[0] as usize;
            if id >= (st.fan_count as usize).min(MOCK_FAN_PORTS) {
                return status::INVALID_ARGUMENTS;
            }
            if st.fan_states[id] != FAN_STATE_OK {
                return status::NOT_PWM;
            }
            st.duty[id] = entry[2];
        }
        status::OK
    }

    fn deliver_later(&self, reply: Vec<u8>, copies: usize) {
        let Some(capture) = self.capture.lock().clone() else {
            self.in_flight.store(false, Ordering::SeqCst);
            return;
        };
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            // Cleared first: delivery wakes the caller, which may send again at once
            in_flight.store(false, Ordering::SeqCst);
            for _ in 0..copies {
                capture.deliver(&reply);
            }
        });
    }
}

#[async_trait]
impl ReportSink for MockController {
    async fn send_output_report(&self, report: &[u8]) -> Result<(), TransportError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.interleaved.fetch_add(1, Ordering::SeqCst);
        }

        let (reply, copies) = {
            let mut st = self.state.lock();
            st.frames.push(report.to_vec());

            let cmd = Command::identify(report);
            let endpoint = cmd
                .filter(|c| c.takes_endpoint())
                .and_then(|c| report.get(CMD_HEADER_SIZE + c.bytes().len()))
                .and_then(|&id| Endpoint::from_u8(id));

            match Self::take_fault(&mut st, cmd, endpoint) {
                Some(Fault::SendError(e)) => {
                    self.in_flight.store(false, Ordering::SeqCst);
                    return Err(e);
                }
                Some(Fault::NoReply) => {
                    self.in_flight.store(false, Ordering::SeqCst);
                    return Ok(());
                }
                Some(Fault::Status(code)) => {
                    let mut reply = vec![0u8; IN_FRAME_SIZE];
                    reply[0] = code;
                    (reply, 1)
                }
                Some(Fault::ReplyLength(len)) => {
                    let mut reply = Self::respond(&mut st, cmd, endpoint, report);
                    reply.resize(len, 0);
                    (reply, 1)
                }
                Some(Fault::Reply { status, len }) => {
                    let mut reply = vec![0u8; len];
                    if let Some(first) = reply.first_mut() {
                        *first = status;
                    }
                    (reply, 1)
                }
                Some(Fault::DuplicateReply) => (Self::respond(&mut st, cmd, endpoint, report), 2),
                None => (Self::respond(&mut st, cmd, endpoint, report), 1),
            }
        };

        self.deliver_later(reply, copies);
        Ok(())
    }

    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }
}
