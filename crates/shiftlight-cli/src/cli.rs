//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// Output format for history export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "shiftlight")]
#[command(author, version, about = "Track BLE connections of the ShiftLight OBD-II bridge", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// History database path
    #[arg(long, global = true, env = "SHIFTLIGHT_DB")]
    pub db: Option<PathBuf>,

    /// Bridge base URL
    #[arg(long, global = true, env = "SHIFTLIGHT_BRIDGE")]
    pub bridge: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the bridge's current BLE status
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Ask the bridge to scan for nearby BLE devices
    Scan {
        /// Scan timeout in seconds
        #[arg(short, long, default_value = "10")]
        timeout: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Ask the bridge to connect to a device
    Connect {
        /// Device address
        address: String,

        /// Device name (defaults to the saved name, then the address)
        #[arg(short, long)]
        name: Option<String>,

        /// Connection attempts the bridge should make
        #[arg(short, long)]
        attempts: Option<u32>,

        /// Keep polling afterwards so the session is recorded
        #[arg(short, long)]
        watch: bool,
    },

    /// Poll the bridge and record connection attempts until Ctrl+C
    Watch {
        /// Poll interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List saved devices (favorites first, then most recent)
    Devices {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one saved device and its recent history
    Show {
        /// Device address
        address: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Toggle the favorite flag of a saved device
    Favorite {
        /// Device address
        address: String,
    },

    /// Clear the recent history of a saved device (lifetime counters are kept)
    Clear {
        /// Device address
        address: String,
    },

    /// Forget a saved device entirely
    Remove {
        /// Device address
        address: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Export every history entry
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: ExportFormat,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        value: String,
    },

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init,
}

/// Configuration keys accepted by `config set`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    BridgeUrl,
    PollInterval,
    Timeout,
    ConnectAttempts,
    Database,
    NoColor,
}
