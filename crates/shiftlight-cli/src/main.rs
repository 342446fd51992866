//! Command-line interface for the ShiftLight BLE bridge.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `status` | Current BLE status reported by the bridge |
//! | `scan` | Ask the bridge to scan for nearby devices |
//! | `connect` | Ask the bridge to connect to a device |
//! | `watch` | Poll the bridge and record connection attempts |
//! | `devices` | List saved devices |
//! | `show` | One saved device and its recent history |
//! | `favorite` / `clear` / `remove` | Manage saved devices |
//! | `export` | Export all history entries as CSV or JSON |
//! | `config` | Manage CLI configuration |
//! | `completions` | Generate shell completions |

mod cli;
mod commands;
mod config;
mod format;
mod style;
mod util;

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::*;
use crate::config::Config;
use crate::util::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions before anything else so they stay clean
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "shiftlight", &mut io::stdout());
        return Ok(());
    }

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let ctx = AppContext::new(
        Config::load(),
        cli.bridge.as_deref(),
        cli.db.as_deref(),
        cli.no_color,
        cli.quiet,
    );

    match cli.command {
        Commands::Status { format } => cmd_status(&ctx, format).await,
        Commands::Scan { timeout, format } => cmd_scan(&ctx, timeout, format).await,
        Commands::Connect {
            address,
            name,
            attempts,
            watch,
        } => cmd_connect(&ctx, &address, name, attempts, watch).await,
        Commands::Watch { interval, json } => cmd_watch(&ctx, interval, json).await,
        Commands::Devices { format } => cmd_devices(&ctx, format),
        Commands::Show { address, format } => cmd_show(&ctx, &address, format),
        Commands::Favorite { address } => cmd_favorite(&ctx, &address),
        Commands::Clear { address } => cmd_clear(&ctx, &address),
        Commands::Remove { address, yes } => cmd_remove(&ctx, &address, yes),
        Commands::Export { format, output } => cmd_export(&ctx, format, output.as_ref()),
        Commands::Config { action } => cmd_config(&ctx, action),
        Commands::Completions { .. } => Ok(()),
    }
}
