//! Export command implementation.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use shiftlight_store::export::{write_csv, write_json};

use crate::cli::ExportFormat;
use crate::util::AppContext;

pub fn cmd_export(ctx: &AppContext, format: ExportFormat, output: Option<&PathBuf>) -> Result<()> {
    let store = ctx.open_store()?;
    let devices = store.list_sorted();

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let rows = match format {
        ExportFormat::Csv => write_csv(devices, writer),
        ExportFormat::Json => write_json(devices, writer),
    }
    .context("Failed to export history")?;

    if let Some(path) = output {
        ctx.note(&format!("Exported {} entries to {}", rows, path.display()));
    }
    Ok(())
}
