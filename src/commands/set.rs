//! Setting command handlers.

use anyhow::{anyhow, bail};

use ccxt_hwmon::Sensor;

use super::{with_commander, CommandResult, Context};
use crate::cli::ControlMode;

/// Write one attribute by hwmon name
pub fn write(ctx: &Context, attr: &str, value: i64) -> CommandResult {
    let sensor: Sensor = attr.parse().map_err(|e: String| anyhow!(e))?;
    with_commander(ctx, |commander| {
        commander.write(sensor, value)?;
        println!("{sensor} <- {value}");
        Ok(())
    })
}

/// Map a 1-based fan number to its channel
pub fn fan_channel(fan: usize) -> anyhow::Result<usize> {
    match fan.checked_sub(1) {
        Some(channel) => Ok(channel),
        None => bail!("fan channels are numbered from 1"),
    }
}

/// Set fan PWM
pub fn set_pwm(ctx: &Context, fan: usize, value: i64) -> CommandResult {
    let channel = fan_channel(fan)?;
    with_commander(ctx, |commander| {
        commander.set_pwm(channel, value)?;
        let readback = commander.fan_pwm(channel)?;
        println!("fan{fan} pwm set to {value} (reads back {readback})");
        if ctx.keep_software_mode {
            return Ok(());
        }
        println!("Note: pass --keep-software-mode to hold the speed after exit");
        Ok(())
    })
}

/// Switch between controller curves and host control
pub fn mode(ctx: &Context, mode: ControlMode) -> CommandResult {
    // Attaching already selects software mode
    let commander = ctx.open()?;
    match mode {
        ControlMode::Hardware => {
            commander.detach()?;
            println!("Controller is running its own fan curves");
        }
        ControlMode::Software => {
            println!("Controller is under host control");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_channel_is_one_based() {
        assert_eq!(fan_channel(1).unwrap(), 0);
        assert_eq!(fan_channel(6).unwrap(), 5);
        assert!(fan_channel(0).is_err());
    }
}
