//! CSV and JSON export of connection history.
//!
//! Exports flatten every device's history window into rows, keeping each
//! device's newest-first order. Devices are emitted in the order given.

use std::io::Write;

use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use shiftlight_types::SavedDevice;

use crate::error::Result;

/// One exported history row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub address: String,
    pub name: String,
    pub timestamp: String,
    pub success: bool,
    pub duration_ms: Option<u64>,
    pub disconnect_reason: Option<String>,
}

/// Flatten device histories into export rows.
pub fn history_rows<'a, I>(devices: I) -> Vec<ExportRow>
where
    I: IntoIterator<Item = &'a SavedDevice>,
{
    devices
        .into_iter()
        .flat_map(|device| {
            device.history().iter().map(move |entry| ExportRow {
                address: device.address().to_string(),
                name: entry.name.clone(),
                timestamp: entry.timestamp.format(&Rfc3339).unwrap_or_default(),
                success: entry.success,
                duration_ms: entry.duration,
                disconnect_reason: entry.disconnect_reason.clone(),
            })
        })
        .collect()
}

/// Write history rows as CSV (with a header row).
pub fn write_csv<'a, I, W>(devices: I, writer: W) -> Result<usize>
where
    I: IntoIterator<Item = &'a SavedDevice>,
    W: Write,
{
    let rows = history_rows(devices);
    let mut csv = csv::Writer::from_writer(writer);

    if rows.is_empty() {
        csv.write_record([
            "address",
            "name",
            "timestamp",
            "success",
            "durationMs",
            "disconnectReason",
        ])?;
    }
    for row in &rows {
        csv.serialize(row)?;
    }
    csv.flush()?;

    Ok(rows.len())
}

/// Write history rows as a pretty-printed JSON array.
pub fn write_json<'a, I, W>(devices: I, mut writer: W) -> Result<usize>
where
    I: IntoIterator<Item = &'a SavedDevice>,
    W: Write,
{
    let rows = history_rows(devices);
    serde_json::to_writer_pretty(&mut writer, &rows)?;
    writeln!(writer)?;
    Ok(rows.len())
}
