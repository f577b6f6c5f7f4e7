//! Device registry - supported controllers by VID/PID

/// Corsair vendor ID
pub const VENDOR_ID: u16 = 0x1b1c;

/// Commander Core XT
pub const COMMANDER_CORE_XT_PID: u16 = 0x0c2a;

/// Known controller PIDs speaking this protocol
pub const SUPPORTED_PIDS: &[u16] = &[COMMANDER_CORE_XT_PID];

/// Check if a VID/PID pair is a supported controller
#[inline]
pub fn is_supported(vid: u16, pid: u16) -> bool {
    vid == VENDOR_ID && SUPPORTED_PIDS.contains(&pid)
}
