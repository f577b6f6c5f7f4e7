//! Command handlers for the CLI application.
//!
//! This module organizes command handlers by category:
//! - `query`: Read-only commands (info, sensors, read)
//! - `set`: Setting commands (write, set-pwm, mode)
//! - `debug`: Debug commands (dump)
//! - `utility`: Utility commands (list, config)

pub mod debug;
pub mod query;
pub mod set;
pub mod utility;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context as _;
use tracing::{debug, warn};

use ccxt_hwmon::SyncCommander;
use ccxt_transport::{HidDiscovery, PrinterConfig};

use crate::config::DriverConfig;

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Everything a handler needs besides its own arguments
pub struct Context {
    pub config: DriverConfig,
    pub printer: Option<PrinterConfig>,
    /// Skip the switch back to hardware mode on exit
    pub keep_software_mode: bool,
}

impl Context {
    /// Discovery for the built-in controllers plus the configured VID/PID
    pub fn discovery(&self) -> HidDiscovery {
        let mut discovery = HidDiscovery::new();
        discovery.add_device(self.config.vid, self.config.pid);
        discovery
    }

    /// Open and attach the first controller found
    pub fn open(&self) -> anyhow::Result<SyncCommander> {
        let device = self.discovery().find_first()?;
        debug!("opening {}", device.info.device_path);
        let commander = SyncCommander::open(
            &device,
            self.config.session_config(),
            self.config.limits,
            self.printer.clone(),
        )
        .context("failed to attach controller")?;
        Ok(commander)
    }
}

/// Open the controller and run a closure with it.
///
/// The controller is detached afterwards, whether or not the closure
/// succeeded, unless `keep_software_mode` is set.
pub fn with_commander<F>(ctx: &Context, f: F) -> CommandResult
where
    F: FnOnce(&SyncCommander) -> CommandResult,
{
    let commander = ctx.open()?;
    let result = f(&commander);
    release(ctx, &commander);
    result
}

/// Hand fan control back to the controller unless asked not to
pub fn release(ctx: &Context, commander: &SyncCommander) {
    if ctx.keep_software_mode {
        debug!("leaving controller in software mode");
        return;
    }
    if let Err(e) = commander.detach() {
        warn!("failed to restore hardware mode: {}", e);
    }
}

/// Setup Ctrl+C handler and return the running flag
pub fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .ok();

    running
}

/// Create printer config from CLI flags
pub fn create_printer_config(monitor: bool, hex: bool) -> Option<PrinterConfig> {
    monitor.then(|| PrinterConfig::default().with_hex(hex))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printer_config_only_when_monitoring() {
        assert!(create_printer_config(false, true).is_none());
        let config = create_printer_config(true, true).unwrap();
        assert!(config.show_hex);
        assert!(!create_printer_config(true, false).unwrap().show_hex);
    }
}
