//! Corsair Commander Core XT Driver CLI
//!
//! A command-line interface for reading and driving the fans of a
//! Commander Core XT controller.

use clap::Parser;
use hidapi::HidApi;
use tracing::debug;
use tracing_subscriber::EnvFilter;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;
use commands::Context;

mod config;
use config::DriverConfig;

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "ccxt=debug" } else { "ccxt=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = DriverConfig::load(cli.config.as_deref())?;
    debug!("config: {:?}", config);

    // Flags enable monitoring on top of the config file defaults
    let printer = commands::create_printer_config(
        cli.monitor || config.monitor,
        cli.hex || config.hex,
    );
    let ctx = Context {
        config,
        printer,
        keep_software_mode: cli.keep_software_mode,
    };

    match cli.command {
        // Default: show device info
        None | Some(Commands::Info) => commands::query::info(&ctx)?,
        Some(Commands::Sensors { watch }) => commands::query::sensors(&ctx, watch)?,
        Some(Commands::Read { attr }) => commands::query::read(&ctx, &attr)?,

        // === Set Commands ===
        Some(Commands::Write { attr, value }) => commands::set::write(&ctx, &attr, value)?,
        Some(Commands::SetPwm { channel, value }) => commands::set::set_pwm(&ctx, channel, value)?,
        Some(Commands::Mode { mode }) => commands::set::mode(&ctx, mode)?,

        // === Debug Commands ===
        Some(Commands::Dump { endpoint }) => commands::debug::dump(&ctx, &endpoint)?,

        // === Utility Commands ===
        Some(Commands::List { all: false }) => commands::utility::list(&ctx)?,
        Some(Commands::List { all: true }) => {
            let hidapi = HidApi::new()?;
            commands::utility::list_all(&hidapi)?;
        }
        Some(Commands::Config) => commands::utility::config(&ctx, cli.config.as_deref())?,
    }

    Ok(())
}
