//! Status command implementation.

use anyhow::{Context, Result};

use shiftlight_core::Bridge;

use crate::cli::OutputFormat;
use crate::format::{format_status_csv, format_status_json, format_status_text};
use crate::style;
use crate::util::{AppContext, write_output};

pub async fn cmd_status(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let bridge = ctx.bridge()?;

    let spinner = match format {
        OutputFormat::Text => ctx.spinner(|| style::fetching_spinner(bridge.base_url())),
        _ => None,
    };
    let result = bridge.fetch_status().await;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let status =
        result.with_context(|| format!("Failed to read status from {}", bridge.base_url()))?;

    let content = match format {
        OutputFormat::Json => format_status_json(&status, &ctx.opts)?,
        OutputFormat::Csv => format_status_csv(&status),
        OutputFormat::Text => format_status_text(&status, &ctx.opts),
    };
    write_output(None, &content)
}
