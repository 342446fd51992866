//! Output formatting utilities for text, JSON, and CSV output.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::builder::Builder;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use shiftlight_core::MonitorEvent;
use shiftlight_types::{BleStatus, DiscoveredDevice, SavedDevice, format_duration};

use crate::style;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self {
            no_color,
            compact: false,
        }
    }

    /// Create with compact JSON option.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Serialize to JSON, pretty or compact, with a trailing newline.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }
}

/// Escape a string for CSV output.
/// Wraps the value in quotes if it contains commas, quotes, or newlines.
/// Double quotes are escaped by doubling them.
#[must_use]
pub fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Human-readable UTC timestamp.
#[must_use]
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    let ts = ts.to_offset(time::UtcOffset::UTC);
    format!(
        "{}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second()
    )
}

fn rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_default()
}

fn optional_duration(ms: Option<f64>) -> String {
    ms.map(|ms| format_duration(ms.round() as u64))
        .unwrap_or_else(|| "-".to_string())
}

// ============================================================================
// Status formatting
// ============================================================================

pub fn format_status_text(status: &BleStatus, opts: &FormatOptions) -> String {
    let mut out = String::new();
    let state = style::format_connection(status.connected, opts.no_color);

    match &status.current_device {
        Some(device) if status.connected == Some(true) => {
            let name = if opts.no_color {
                device.name.clone()
            } else {
                format!("{}", device.name.cyan())
            };
            out.push_str(&format!("{} {} ({})\n", state, name, device.address));
        }
        _ => out.push_str(&format!("{}\n", state)),
    }

    if status.scanning {
        out.push_str("Scan in progress\n");
    }
    if !status.devices.is_empty() {
        out.push_str(&format!(
            "{} device(s) from the last scan\n",
            status.devices.len()
        ));
    }
    out
}

pub fn format_status_json(status: &BleStatus, opts: &FormatOptions) -> Result<String> {
    opts.as_json(status)
}

pub fn format_status_csv(status: &BleStatus) -> String {
    let (address, name) = status
        .current_device
        .as_ref()
        .map(|d| (csv_escape(&d.address), csv_escape(&d.name)))
        .unwrap_or_default();
    let connected = status
        .connected
        .map(|c| c.to_string())
        .unwrap_or_default();

    format!(
        "connected,scanning,address,name\n{},{},{},{}\n",
        connected, status.scanning, address, name
    )
}

// ============================================================================
// Scan formatting
// ============================================================================

/// A discovered device annotated with what the history store knows about it.
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry<'a> {
    pub name: &'a str,
    pub address: &'a str,
    pub rssi: Option<i16>,
    pub saved: bool,
    pub favorite: bool,
}

impl<'a> ScanEntry<'a> {
    pub fn new(device: &'a DiscoveredDevice, saved: Option<&SavedDevice>) -> Self {
        Self {
            name: &device.name,
            address: &device.address,
            rssi: device.rssi,
            saved: saved.is_some(),
            favorite: saved.is_some_and(SavedDevice::is_favorite),
        }
    }
}

pub fn format_scan_text(entries: &[ScanEntry<'_>], opts: &FormatOptions) -> String {
    if entries.is_empty() {
        return "No devices found.\n".to_string();
    }

    let mut builder = Builder::default();
    builder.push_record(["", "Name", "Address", "RSSI", "Saved"]);
    for entry in entries {
        builder.push_record([
            style::format_favorite(entry.favorite, opts.no_color),
            entry.name.to_string(),
            entry.address.to_string(),
            entry
                .rssi
                .map(|r| format!("{} dBm", r))
                .unwrap_or_else(|| "-".to_string()),
            if entry.saved { "yes" } else { "" }.to_string(),
        ]);
    }

    let mut table = builder.build();
    style::apply_table_style(&mut table, opts.no_color);
    format!("Found {} device(s):\n{}\n", entries.len(), table)
}

pub fn format_scan_json(entries: &[ScanEntry<'_>], opts: &FormatOptions) -> Result<String> {
    #[derive(Serialize)]
    struct ScanResult<'a> {
        count: usize,
        devices: &'a [ScanEntry<'a>],
    }

    opts.as_json(&ScanResult {
        count: entries.len(),
        devices: entries,
    })
}

pub fn format_scan_csv(entries: &[ScanEntry<'_>]) -> String {
    let mut out = String::from("name,address,rssi,saved,favorite\n");
    for entry in entries {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_escape(entry.name),
            csv_escape(entry.address),
            entry.rssi.map(|r| r.to_string()).unwrap_or_default(),
            entry.saved,
            entry.favorite
        ));
    }
    out
}

// ============================================================================
// Saved device formatting
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceJson<'a> {
    #[serde(flatten)]
    device: &'a SavedDevice,
    success_rate: u8,
}

impl<'a> From<&'a SavedDevice> for DeviceJson<'a> {
    fn from(device: &'a SavedDevice) -> Self {
        Self {
            device,
            success_rate: device.success_rate(),
        }
    }
}

pub fn format_devices_text(devices: &[&SavedDevice], opts: &FormatOptions) -> String {
    if devices.is_empty() {
        return "No saved devices.\n".to_string();
    }

    let mut builder = Builder::default();
    builder.push_record([
        "",
        "Name",
        "Address",
        "Last connected",
        "Success",
        "Attempts",
        "Avg session",
    ]);
    for device in devices {
        builder.push_record([
            style::format_favorite(device.is_favorite(), opts.no_color),
            device.name().to_string(),
            device.address().to_string(),
            device
                .last_connected()
                .map(format_timestamp)
                .unwrap_or_else(|| "never".to_string()),
            style::format_success_rate(device.success_rate(), opts.no_color),
            device.total_connections().to_string(),
            optional_duration(device.average_connection_duration()),
        ]);
    }

    let mut table = builder.build();
    style::apply_table_style(&mut table, opts.no_color);
    format!("{}\n", table)
}

pub fn format_devices_json(devices: &[&SavedDevice], opts: &FormatOptions) -> Result<String> {
    let devices: Vec<DeviceJson<'_>> = devices.iter().map(|d| DeviceJson::from(*d)).collect();
    opts.as_json(&devices)
}

pub fn format_devices_csv(devices: &[&SavedDevice]) -> String {
    let mut out = String::from(concat!(
        "address,name,isFavorite,lastConnected,totalConnections,",
        "successfulConnections,failedConnections,successRate,averageConnectionDuration\n",
    ));
    for device in devices {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{}\n",
            csv_escape(device.address()),
            csv_escape(device.name()),
            device.is_favorite(),
            device.last_connected().map(rfc3339).unwrap_or_default(),
            device.total_connections(),
            device.successful_connections(),
            device.failed_connections(),
            device.success_rate(),
            device
                .average_connection_duration()
                .map(|ms| format!("{:.0}", ms))
                .unwrap_or_default()
        ));
    }
    out
}

pub fn format_device_text(device: &SavedDevice, opts: &FormatOptions) -> String {
    let mut title = device.name().to_string();
    if device.is_favorite() {
        title.push_str(" (favorite)");
    }

    let mut out = style::format_title(&title, opts.no_color);
    out.push('\n');
    out.push_str(&format!("Address:         {}\n", device.address()));
    out.push_str(&format!(
        "Last connected:  {}\n",
        device
            .last_connected()
            .map(format_timestamp)
            .unwrap_or_else(|| "never".to_string())
    ));
    out.push_str(&format!(
        "Attempts:        {} ({} ok, {} failed)\n",
        device.total_connections(),
        device.successful_connections(),
        device.failed_connections()
    ));
    out.push_str(&format!(
        "Success rate:    {}\n",
        style::format_success_rate(device.success_rate(), opts.no_color)
    ));
    out.push_str(&format!(
        "Avg session:     {}\n",
        optional_duration(device.average_connection_duration())
    ));

    if device.history().is_empty() {
        out.push_str("\nNo recent history.\n");
        return out;
    }

    let mut builder = Builder::default();
    builder.push_record(["When", "Result", "Duration", "Reason"]);
    for entry in device.history() {
        builder.push_record([
            format_timestamp(entry.timestamp),
            style::format_outcome(entry.success, opts.no_color),
            entry
                .duration
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string()),
            entry.disconnect_reason.clone().unwrap_or_default(),
        ]);
    }
    let mut table = builder.build();
    style::apply_table_style(&mut table, opts.no_color);
    out.push_str(&format!("\nRecent history:\n{}\n", table));
    out
}

pub fn format_device_json(device: &SavedDevice, opts: &FormatOptions) -> Result<String> {
    opts.as_json(&DeviceJson::from(device))
}

pub fn format_device_csv(device: &SavedDevice) -> String {
    let mut out = String::from("timestamp,success,durationMs,disconnectReason\n");
    for entry in device.history() {
        out.push_str(&format!(
            "{},{},{},{}\n",
            rfc3339(entry.timestamp),
            entry.success,
            entry.duration.map(|d| d.to_string()).unwrap_or_default(),
            csv_escape(entry.disconnect_reason.as_deref().unwrap_or_default())
        ));
    }
    out
}

// ============================================================================
// Watch events
// ============================================================================

/// One line describing a monitor event.
pub fn format_event_line(event: &MonitorEvent, opts: &FormatOptions) -> String {
    let now = format_timestamp(OffsetDateTime::now_utc());
    let stamp = if opts.no_color {
        format!("[{}]", now)
    } else {
        format!("{}", format!("[{}]", now).dimmed())
    };

    let message = match event {
        MonitorEvent::Connected { device, .. } => {
            format!("{} {}", style::format_outcome(true, opts.no_color), device)
        }
        MonitorEvent::Disconnected {
            device,
            duration_ms,
            ..
        } => match duration_ms {
            Some(ms) => format!("{} disconnected after {}", device, format_duration(*ms)),
            None => format!("{} disconnected", device),
        },
        MonitorEvent::ConnectFailed { device, error, .. } => format!(
            "{} connect to {} failed: {}",
            style::format_outcome(false, opts.no_color),
            device,
            error
        ),
        MonitorEvent::PollFailed {
            error,
            consecutive_failures,
        } => format!(
            "bridge unreachable ({} in a row): {}",
            consecutive_failures, error
        ),
        MonitorEvent::AttemptDropped { edge } => {
            format!("{} edge with no known device, not recorded", edge)
        }
        MonitorEvent::RecordFailed { device, error } => {
            format!("could not save attempt for {}: {}", device, error)
        }
        other => format!("{:?}", other),
    };

    format!("{} {}\n", stamp, message)
}
