//! Utility functions for CLI operations.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use dialoguer::{Confirm, theme::ColorfulTheme};
use indicatif::ProgressBar;

use shiftlight_core::BridgeClient;
use shiftlight_store::HistoryStore;
use shiftlight_types::SavedDevice;

use crate::config::{Config, resolve_bridge_url, resolve_db_path};
use crate::format::FormatOptions;

/// Settings shared by every command after flags, environment and config are merged.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    pub bridge_url: String,
    pub db_path: PathBuf,
    pub opts: FormatOptions,
    pub quiet: bool,
}

impl AppContext {
    pub fn new(
        config: Config,
        bridge: Option<&str>,
        db: Option<&Path>,
        no_color: bool,
        quiet: bool,
    ) -> Self {
        let bridge_url = resolve_bridge_url(bridge, &config);
        let db_path = resolve_db_path(db, &config);
        let opts = FormatOptions::new(no_color || config.no_color);
        Self {
            config,
            bridge_url,
            db_path,
            opts,
            quiet,
        }
    }

    /// Open the history database.
    pub fn open_store(&self) -> Result<HistoryStore> {
        HistoryStore::open(&self.db_path).with_context(|| {
            format!(
                "Failed to open history database: {}",
                self.db_path.display()
            )
        })
    }

    /// HTTP client for the configured bridge.
    pub fn bridge(&self) -> Result<BridgeClient> {
        BridgeClient::with_timeout(&self.bridge_url, self.config.timeout())
            .with_context(|| format!("Invalid bridge URL: {}", self.bridge_url))
    }

    /// Spinner on stderr, only for interactive text output.
    pub fn spinner(&self, make: impl FnOnce() -> ProgressBar) -> Option<ProgressBar> {
        (!self.quiet && io::stderr().is_terminal()).then(make)
    }

    /// Print a confirmation line unless `--quiet` was given.
    pub fn note(&self, message: &str) {
        if !self.quiet {
            println!("{}", message);
        }
    }
}

/// Look up a saved device, with a helpful error message.
pub fn require_saved<'a>(store: &'a HistoryStore, address: &str) -> Result<&'a SavedDevice> {
    match store.get_device(address) {
        Some(device) => Ok(device),
        None => bail!(
            "No saved device with address {}.\n\
             Run 'shiftlight devices' to list known devices.",
            address
        ),
    }
}

/// Ask for confirmation, refusing outright when there is no terminal to ask on.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
        bail!("Refusing to continue without confirmation. Pass --yes to skip the prompt.");
    }

    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to get user confirmation")
}

/// Write output to file or stdout
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}
