// CLI definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ccxt_driver")]
#[command(author, version, about = "Corsair Commander Core XT Linux Driver")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable transport monitoring (prints all commands/responses)
    #[arg(long, global = true)]
    pub monitor: bool,

    /// Show raw hex dump alongside decoded output
    #[arg(long, global = true)]
    pub hex: bool,

    /// Config file (default: ~/.config/ccxt-driver/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Leave the controller in software mode on exit
    #[arg(long, global = true)]
    pub keep_software_mode: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // === Query Commands ===
    /// Get firmware version and connected fans
    #[command(visible_aliases = ["version", "ver", "v"])]
    Info,

    /// Show every published sensor attribute and its value
    #[command(visible_aliases = ["sens", "s"])]
    Sensors {
        /// Refresh every N milliseconds until Ctrl+C
        #[arg(short, long, value_name = "MS")]
        watch: Option<u64>,
    },

    /// Read one attribute (e.g. fan1_input, pwm2, fan3_label)
    #[command(visible_alias = "r")]
    Read {
        /// hwmon attribute name
        attr: String,
    },

    // === Set Commands ===
    /// Write one attribute (e.g. pwm2 128, fan1_target 900)
    #[command(visible_alias = "w")]
    Write {
        /// hwmon attribute name
        attr: String,
        /// Value to write
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },

    /// Set fan PWM (channel 1-6, value 0-255)
    #[command(visible_aliases = ["pwm", "p"])]
    SetPwm {
        /// Fan channel (1-based, as in fanN)
        channel: usize,
        /// PWM value (0-255)
        value: i64,
    },

    /// Switch between controller curves and host control
    #[command(visible_alias = "m")]
    Mode {
        #[arg(value_enum)]
        mode: ControlMode,
    },

    // === Debug Commands ===
    /// Read an endpoint and dump the raw payload
    #[command(visible_alias = "d")]
    Dump {
        /// Endpoint name or id (fan-state, fan-pwm, fan-inventory, temperature-inventory, 0x17)
        endpoint: String,
    },

    // === Utility Commands ===
    /// List connected controllers
    #[command(visible_alias = "ls")]
    List {
        /// List every HID device instead
        #[arg(short, long)]
        all: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Who drives the fans
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ControlMode {
    /// The controller's own fan curves
    #[value(alias = "hw")]
    Hardware,
    /// Host-controlled PWM
    #[value(alias = "sw")]
    Software,
}
