//! fireshockctl - FireShock filter inspection CLI
//!
//! Prints the descriptors and reports the filter synthesizes, decodes raw
//! controller input and runs the filter end to end against in-memory hosts.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fireshock_hid_dualshock_protocol::{BD_ADDR_LEN, BdAddr};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::simulate::SimulateOptions;
use crate::commands::{DescriptorKind, DeviceArg};
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "fireshockctl")]
#[command(about = "FireShock DualShock filter tools")]
#[command(version)]
#[command(long_about = "
fireshockctl inspects the byte-level behaviour of the FireShock DualShock
filter: synthesized descriptors, input report translation, sideband control
codes, and a full attach/enable/read/detach cycle against in-memory hosts.

Use --json for machine-readable output suitable for scripting.
")]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a synthesized DualShock 3 descriptor
    Descriptor {
        #[arg(value_enum)]
        kind: DescriptorKind,

        /// Buffer length offered by the host (defaults to the full descriptor)
        #[arg(long)]
        len: Option<usize>,
    },

    /// Decode a raw input report given as hex
    Decode {
        #[arg(long, value_enum, default_value = "ds3")]
        device: DeviceArg,

        /// Report bytes, e.g. "01 00 00 00 ..."
        hex: String,
    },

    /// Run a DualShock 3 through the filter against mock hosts
    Simulate {
        /// Interrupt IN transfers to drive
        #[arg(long, default_value_t = 10)]
        frames: u32,

        /// Enable commands the device rejects before accepting one
        #[arg(long, default_value_t = 0)]
        fail_enable: u32,

        /// Filter configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Rumble from the virtual pad after the last frame, as SMALL,LARGE
        #[arg(long, value_parser = parse_rumble)]
        rumble: Option<(u8, u8)>,

        /// Pair the controller with this host, as AA:BB:CC:DD:EE:FF
        #[arg(long, value_parser = parse_bd_addr)]
        pair_host: Option<BdAddr>,
    },

    /// List the control codes the filter recognizes
    Ioctl,
}

fn parse_rumble(value: &str) -> Result<(u8, u8), String> {
    let (small, large) = value
        .split_once(',')
        .ok_or_else(|| "expected SMALL,LARGE".to_string())?;
    let small = small.trim().parse::<u8>().map_err(|e| e.to_string())?;
    let large = large.trim().parse::<u8>().map_err(|e| e.to_string())?;
    Ok((small, large))
}

fn parse_bd_addr(value: &str) -> Result<BdAddr, String> {
    let mut address = [0u8; BD_ADDR_LEN];
    let mut octets = value.split(':');
    for slot in &mut address {
        let octet = octets
            .next()
            .ok_or_else(|| "expected six colon-separated octets".to_string())?;
        *slot = u8::from_str_radix(octet.trim(), 16).map_err(|e| e.to_string())?;
    }
    if octets.next().is_some() {
        return Err("expected six colon-separated octets".to_string());
    }
    Ok(BdAddr(address))
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Descriptor { kind, len } => commands::descriptor::execute(*kind, *len, cli.json),
        Commands::Decode { device, hex } => commands::decode::execute(*device, hex, cli.json),
        Commands::Simulate {
            frames,
            fail_enable,
            config,
            rumble,
            pair_host,
        } => {
            let options = SimulateOptions {
                frames: *frames,
                fail_enable: *fail_enable,
                config: config.clone(),
                rumble: *rumble,
                pair_host: *pair_host,
            };
            commands::simulate::execute(&options, cli.json)
        }
        Commands::Ioctl => commands::ioctl::execute(cli.json),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("fireshockctl={log_level},fireshock_filter={log_level}").into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}
