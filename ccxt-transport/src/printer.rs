//! Printer middleware for monitoring traffic to and from the controller
//!
//! `PrinterSink` wraps any `ReportSink` and prints every outgoing frame
//! before passing it on. Input reports are printed by handing
//! `Printer::print_input` to the reader callback.
//!
//! # Example
//!
//! ```ignore
//! use ccxt_transport::{PrinterConfig, PrinterSink};
//!
//! let sink = PrinterSink::wrap(Arc::new(transport), PrinterConfig::default().with_hex(true));
//! let session = Session::new(sink, SessionConfig::default());
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use crossterm::style::Stylize;

use crate::protocol::{status, Command, Endpoint, CMD_HEADER_SIZE};
use crate::{DeviceInfo, ReportSink, TransportError};

/// Bytes per row in hex dumps
const DUMP_ROW: usize = 16;

/// Configuration for the printer
#[derive(Debug, Clone, Default)]
pub struct PrinterConfig {
    /// Show full hex/decimal dump alongside the decoded line
    pub show_hex: bool,
}

impl PrinterConfig {
    /// Create config with hex output setting
    pub fn with_hex(mut self, show: bool) -> Self {
        self.show_hex = show;
        self
    }
}

/// Prints frames to stderr
#[derive(Debug, Clone, Default)]
pub struct Printer {
    config: PrinterConfig,
}

impl Printer {
    pub fn new(config: PrinterConfig) -> Self {
        Self { config }
    }

    /// Print an outgoing report
    pub fn print_output(&self, report: &[u8]) {
        eprintln!("{} {}  {}", ">>>".cyan(), "CMD".cyan().bold(), describe_frame(report));
        if self.config.show_hex {
            eprint!("{}", hex_dump(trim_padding(report)));
        }
    }

    /// Print an input report
    pub fn print_input(&self, report: &[u8]) {
        let Some(&code) = report.first() else {
            return;
        };
        let label = status_name(code);
        if code == status::OK {
            eprintln!("{} {}  {} ({} bytes)", "<<<".green(), "RSP".green().bold(), label, report.len());
        } else {
            eprintln!(
                "{} {}  {} ({} bytes)",
                "<<<".green(),
                "RSP".green().bold(),
                label.red().bold(),
                report.len()
            );
        }
        if self.config.show_hex {
            eprint!("{}", hex_dump(trim_padding(report)));
        }
    }
}

/// Sink middleware that prints every outgoing frame
pub struct PrinterSink {
    inner: Arc<dyn ReportSink>,
    printer: Printer,
}

impl PrinterSink {
    /// Wrap a sink with printing middleware
    pub fn wrap(sink: Arc<dyn ReportSink>, config: PrinterConfig) -> Arc<dyn ReportSink> {
        Arc::new(Self {
            inner: sink,
            printer: Printer::new(config),
        })
    }
}

#[async_trait]
impl ReportSink for PrinterSink {
    async fn send_output_report(&self, report: &[u8]) -> Result<(), TransportError> {
        self.printer.print_output(report);
        self.inner.send_output_report(report).await
    }

    fn device_info(&self) -> &DeviceInfo {
        self.inner.device_info()
    }
}

/// One-line description of an outgoing frame: command name plus endpoint
pub fn describe_frame(report: &[u8]) -> String {
    let Some(cmd) = Command::identify(report) else {
        let body = report.get(CMD_HEADER_SIZE..).unwrap_or(&[]);
        return format!("UNKNOWN {:02x?}", &body[..body.len().min(8)]);
    };

    if !cmd.takes_endpoint() {
        return cmd.name().to_string();
    }
    match report.get(CMD_HEADER_SIZE + cmd.bytes().len()) {
        Some(&id) => match Endpoint::from_u8(id) {
            Some(ep) => format!("{} {}", cmd.name(), ep),
            None => format!("{} 0x{:02x}", cmd.name(), id),
        },
        None => cmd.name().to_string(),
    }
}

fn status_name(code: u8) -> String {
    match code {
        status::OK => "OK".to_string(),
        status::INVALID_COMMAND => "INVALID_COMMAND".to_string(),
        status::INVALID_ARGUMENTS => "INVALID_ARGUMENTS".to_string(),
        status::DISCONNECTED => "DISCONNECTED".to_string(),
        status::NOT_PWM => "NOT_PWM".to_string(),
        other => format!("STATUS 0x{other:02x}"),
    }
}

/// Drop trailing zero padding, keeping at least one full row
fn trim_padding(bytes: &[u8]) -> &[u8] {
    let used = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..used.max(DUMP_ROW).min(bytes.len())]
}

/// Render `bytes` as hex rows followed by the same rows in decimal,
/// sixteen bytes per row.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (section, decimal) in [("hex", false), ("dec", true)] {
        let _ = writeln!(out, "  {section}:");
        for (row, chunk) in bytes.chunks(DUMP_ROW).enumerate() {
            let _ = write!(out, "  {:04x} ", row * DUMP_ROW);
            for b in chunk {
                if decimal {
                    let _ = write!(out, " {b:3}");
                } else {
                    let _ = write!(out, " {b:02x}");
                }
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OutFrame;

    #[test]
    fn test_describe_endpoint_command() {
        let frame = OutFrame::endpoint_command(Command::READ, Endpoint::FanState);
        assert_eq!(describe_frame(frame.as_bytes()), "READ fan-state (0x17)");
    }

    #[test]
    fn test_describe_mode_commands() {
        let hw = OutFrame::command(Command::HARDWARE_MODE);
        let sw = OutFrame::command(Command::SOFTWARE_MODE);
        assert_eq!(describe_frame(hw.as_bytes()), "HARDWARE_MODE");
        assert_eq!(describe_frame(sw.as_bytes()), "SOFTWARE_MODE");
    }

    #[test]
    fn test_describe_unknown_frame() {
        let desc = describe_frame(&[0x00, 0x08, 0x7f, 0x01]);
        assert!(desc.starts_with("UNKNOWN"));
    }

    #[test]
    fn test_hex_dump_rows() {
        let bytes: Vec<u8> = (0u8..20).collect();
        let dump = hex_dump(&bytes);
        let lines: Vec<&str> = dump.lines().collect();
        // header + 2 rows, twice
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1], "  0000  00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f");
        assert_eq!(lines[2], "  0010  10 11 12 13");
        assert_eq!(lines[5], "  0010   16  17  18  19");
    }

    #[test]
    fn test_trim_padding_keeps_one_row() {
        let mut bytes = [0u8; 64];
        bytes[2] = 1;
        assert_eq!(trim_padding(&bytes).len(), DUMP_ROW);
        bytes[40] = 1;
        assert_eq!(trim_padding(&bytes).len(), 41);
    }
}
