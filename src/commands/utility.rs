//! Utility command handlers.

use hidapi::HidApi;

use super::{CommandResult, Context};
use crate::config::DriverConfig;

/// List connected controllers
pub fn list(ctx: &Context) -> CommandResult {
    let devices = ctx.discovery().list_devices()?;
    if devices.is_empty() {
        println!(
            "No controller found (looking for VID={:04x} PID={:04x})",
            ctx.config.vid, ctx.config.pid
        );
        return Ok(());
    }
    println!("Found {} controller(s):", devices.len());
    for device in devices {
        println!("  {}", device.info);
    }
    Ok(())
}

/// List all HID devices
pub fn list_all(hidapi: &HidApi) -> CommandResult {
    println!("All HID devices:");
    for device_info in hidapi.device_list() {
        println!(
            "  VID={:04x} PID={:04x} usage={:04x} page={:04x} if={} {}",
            device_info.vendor_id(),
            device_info.product_id(),
            device_info.usage(),
            device_info.usage_page(),
            device_info.interface_number(),
            device_info.product_string().unwrap_or(""),
        );
    }
    Ok(())
}

/// Print the effective configuration
pub fn config(ctx: &Context, path: Option<&std::path::Path>) -> CommandResult {
    let shown = match path {
        Some(p) => p.to_path_buf(),
        None => DriverConfig::default_path(),
    };
    println!("# {}", shown.display());
    print!("{}", ctx.config.to_toml()?);
    Ok(())
}
