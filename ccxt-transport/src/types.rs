//! Device descriptors returned by discovery

use std::fmt;

/// Identity of one controller HID interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub vid: u16,
    pub pid: u16,
    /// hidraw path as reported by hidapi
    pub device_path: String,
    /// USB interface number, -1 when the backend does not know it
    pub interface: i32,
    pub serial: Option<String>,
    pub product_name: Option<String>,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} {} (if={}, serial={}) at {}",
            self.vid,
            self.pid,
            self.product_name.as_deref().unwrap_or("unknown product"),
            self.interface,
            self.serial.as_deref().unwrap_or("none"),
            self.device_path
        )
    }
}

/// A controller found by discovery, not opened yet
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub info: DeviceInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_falls_back_for_missing_strings() {
        let info = DeviceInfo {
            vid: 0x1b1c,
            pid: 0x0c2a,
            device_path: "/dev/hidraw3".into(),
            interface: 0,
            serial: None,
            product_name: None,
        };
        assert_eq!(
            info.to_string(),
            "1b1c:0c2a unknown product (if=0, serial=none) at /dev/hidraw3"
        );
    }
}
