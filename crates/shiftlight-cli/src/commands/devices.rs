//! Saved device commands: listing, details, favorites, clearing and removal.

use anyhow::Result;

use crate::cli::OutputFormat;
use crate::format::{
    format_device_csv, format_device_json, format_device_text, format_devices_csv,
    format_devices_json, format_devices_text,
};
use crate::util::{AppContext, confirm, require_saved, write_output};

pub fn cmd_devices(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let store = ctx.open_store()?;
    let devices = store.list_sorted();

    let content = match format {
        OutputFormat::Json => format_devices_json(&devices, &ctx.opts)?,
        OutputFormat::Csv => format_devices_csv(&devices),
        OutputFormat::Text => {
            if devices.is_empty() && !ctx.quiet {
                "No saved devices.\n\
                 Devices are saved the first time 'shiftlight watch' sees them connect.\n"
                    .to_string()
            } else {
                format_devices_text(&devices, &ctx.opts)
            }
        }
    };
    write_output(None, &content)
}

pub fn cmd_show(ctx: &AppContext, address: &str, format: OutputFormat) -> Result<()> {
    let store = ctx.open_store()?;
    let device = require_saved(&store, address)?;

    let content = match format {
        OutputFormat::Json => format_device_json(device, &ctx.opts)?,
        OutputFormat::Csv => format_device_csv(device),
        OutputFormat::Text => format_device_text(device, &ctx.opts),
    };
    write_output(None, &content)
}

pub fn cmd_favorite(ctx: &AppContext, address: &str) -> Result<()> {
    let mut store = ctx.open_store()?;
    let name = require_saved(&store, address)?.name().to_string();

    if store.toggle_favorite(address)? == Some(true) {
        ctx.note(&format!("Marked {} as favorite", name));
    } else {
        ctx.note(&format!("Removed {} from favorites", name));
    }
    Ok(())
}

pub fn cmd_clear(ctx: &AppContext, address: &str) -> Result<()> {
    let mut store = ctx.open_store()?;
    let device = require_saved(&store, address)?;
    let (name, entries) = (device.name().to_string(), device.history().len());

    store.clear_history(address)?;
    ctx.note(&format!(
        "Cleared {} history entr{} for {} (lifetime counters kept)",
        entries,
        if entries == 1 { "y" } else { "ies" },
        name
    ));
    Ok(())
}

pub fn cmd_remove(ctx: &AppContext, address: &str, yes: bool) -> Result<()> {
    let mut store = ctx.open_store()?;
    let device = require_saved(&store, address)?;
    let label = format!("{} ({})", device.name(), device.address());

    if !yes && !confirm(&format!("Forget {} and all of its history?", label))? {
        ctx.note("Aborted");
        return Ok(());
    }

    store.remove_device(address)?;
    ctx.note(&format!("Removed {}", label));
    Ok(())
}
