//! Query (read-only) command handlers.

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::anyhow;
use crossterm::style::Stylize;

use ccxt_hwmon::{Access, Sensor, SyncCommander};

use super::{setup_interrupt_handler, with_commander, CommandResult, Context};

/// Get firmware version and connected fans
pub fn info(ctx: &Context) -> CommandResult {
    with_commander(ctx, |commander| {
        let info = commander.commander().session().sink().device_info();
        println!("Device: VID={:04X} PID={:04X}", info.vid, info.pid);
        if let Some(name) = &info.product_name {
            println!("Product:    {name}");
        }
        if let Some(serial) = &info.serial {
            println!("Serial:     {serial}");
        }

        match commander.firmware_version() {
            Some(fw) => println!("Firmware:   {fw}"),
            None => println!("Firmware:   {}", "unavailable".dark_grey()),
        }
        match commander.block_on(commander.commander().bootloader_version()) {
            Ok(version) => println!("Bootloader: {version}"),
            Err(e) => println!("Bootloader: {}", e.to_string().dark_grey()),
        }

        let limits = commander.commander().limits();
        let fans = commander.commander().connected_fans();
        let names: Vec<String> = fans.iter().map(|ch| format!("fan{}", ch + 1)).collect();
        println!(
            "Fans:       {}/{} connected {}",
            fans.len(),
            limits.fans,
            if names.is_empty() {
                String::new()
            } else {
                format!("({})", names.join(", "))
            }
        );
        Ok(())
    })
}

/// One line per published attribute: name, mode, value or error
pub fn sensor_lines(commander: &SyncCommander) -> Vec<String> {
    commander
        .surface()
        .into_iter()
        .map(|(sensor, access)| {
            let value = match commander.read(sensor) {
                Ok(v) => v.to_string(),
                Err(e) => format!("<{e}>"),
            };
            format!("{:<14} {:04o}  {}", sensor.to_string(), access.mode(), value)
        })
        .collect()
}

/// Show every published sensor attribute
pub fn sensors(ctx: &Context, watch: Option<u64>) -> CommandResult {
    with_commander(ctx, |commander| {
        let Some(interval) = watch else {
            print_sensors(commander);
            return Ok(());
        };

        let running = setup_interrupt_handler();
        println!("Refreshing every {interval} ms (Ctrl+C to stop)...");
        while running.load(Ordering::SeqCst) {
            print_sensors(commander);
            println!();
            std::thread::sleep(Duration::from_millis(interval));
        }
        Ok(())
    })
}

fn print_sensors(commander: &SyncCommander) {
    let lines = sensor_lines(commander);
    if lines.is_empty() {
        println!("{}", "No sensors published (no fans connected)".yellow());
    }
    for line in lines {
        println!("{line}");
    }
}

/// Read one attribute by hwmon name
pub fn read(ctx: &Context, attr: &str) -> CommandResult {
    let sensor: Sensor = attr.parse().map_err(|e: String| anyhow!(e))?;
    with_commander(ctx, |commander| {
        if commander.visibility(sensor) == Access::Hidden {
            println!("{}", format!("{sensor} is not published").yellow());
        }
        let value = commander.read(sensor)?;
        println!("{sensor}: {value}");
        Ok(())
    })
}
