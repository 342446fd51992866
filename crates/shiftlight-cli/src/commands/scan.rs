//! Scan command implementation.

use anyhow::{Context, Result};

use shiftlight_core::{ScanOptions, scan};

use crate::cli::OutputFormat;
use crate::format::{ScanEntry, format_scan_csv, format_scan_json, format_scan_text};
use crate::style;
use crate::util::{AppContext, write_output};

pub async fn cmd_scan(ctx: &AppContext, timeout: u64, format: OutputFormat) -> Result<()> {
    let bridge = ctx.bridge()?;
    let store = ctx.open_store()?;
    let options = ScanOptions::new().timeout_secs(timeout);

    // Only show spinner for interactive text output
    let spinner = match format {
        OutputFormat::Text => ctx.spinner(|| style::scanning_spinner(timeout)),
        _ => None,
    };
    let result = scan(&bridge, &options).await;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let devices =
        result.with_context(|| format!("Failed to scan through {}", bridge.base_url()))?;

    let entries: Vec<ScanEntry<'_>> = devices
        .iter()
        .map(|d| ScanEntry::new(d, store.get_device(&d.address)))
        .collect();

    let content = match format {
        OutputFormat::Json => format_scan_json(&entries, &ctx.opts)?,
        OutputFormat::Csv => format_scan_csv(&entries),
        OutputFormat::Text => format_scan_text(&entries, &ctx.opts),
    };
    write_output(None, &content)
}
