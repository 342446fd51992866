//! Visual styling utilities for the CLI.
//!
//! Spinners for bridge round-trips, colored labels and table styling.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tabled::Table;
use tabled::settings::Style;

/// Braille dots animation
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

const SPINNER_TICK_MS: u64 = 80;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .expect("valid template")
        .tick_chars(SPINNER_TICK_CHARS)
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Spinner shown while the bridge scans.
pub fn scanning_spinner(timeout_secs: u64) -> ProgressBar {
    spinner(format!("Bridge is scanning for BLE devices... ({}s)", timeout_secs))
}

/// Spinner shown while the bridge connects to a device.
pub fn connecting_spinner(device: &str) -> ProgressBar {
    spinner(format!("Connecting to {}...", device))
}

/// Spinner for a plain status request.
pub fn fetching_spinner(url: &str) -> ProgressBar {
    spinner(format!("Contacting bridge at {}...", url))
}

/// Success/failure marker for a history entry.
pub fn format_outcome(success: bool, no_color: bool) -> String {
    match (success, no_color) {
        (true, true) => "[OK]".to_string(),
        (false, true) => "[FAIL]".to_string(),
        (true, false) => format!("{}", "✓".green()),
        (false, false) => format!("{}", "✗".red()),
    }
}

/// Success rate colored by band: 80% and up green, 50% and up yellow, red below.
pub fn format_success_rate(rate: u8, no_color: bool) -> String {
    let label = format!("{}%", rate);
    if no_color {
        label
    } else if rate >= 80 {
        format!("{}", label.green())
    } else if rate >= 50 {
        format!("{}", label.yellow())
    } else {
        format!("{}", label.red())
    }
}

/// Favorite marker (empty for non-favorites).
pub fn format_favorite(is_favorite: bool, no_color: bool) -> String {
    match (is_favorite, no_color) {
        (false, _) => String::new(),
        (true, true) => "*".to_string(),
        (true, false) => format!("{}", "★".yellow()),
    }
}

/// Connection state label.
pub fn format_connection(connected: Option<bool>, no_color: bool) -> String {
    let label = match connected {
        Some(true) => "CONNECTED",
        Some(false) => "DISCONNECTED",
        None => "UNKNOWN",
    };
    if no_color {
        return format!("[{}]", label);
    }
    match connected {
        Some(true) => format!("[{}]", label.green()),
        Some(false) => format!("[{}]", label.red()),
        None => format!("[{}]", label.dimmed()),
    }
}

/// Format a title header.
pub fn format_title(title: &str, no_color: bool) -> String {
    if no_color {
        format!("{}\n{}", title, "━".repeat(title.chars().count()))
    } else {
        format!(
            "{}\n{}",
            title.bold(),
            "━".repeat(title.chars().count()).dimmed()
        )
    }
}

/// Apply the table style used across commands.
pub fn apply_table_style(table: &mut Table, no_color: bool) {
    if no_color {
        table.with(Style::ascii());
    } else {
        table.with(Style::rounded());
    }
}
