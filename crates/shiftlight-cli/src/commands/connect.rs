//! Connect command implementation.

use anyhow::{Context, Result};

use shiftlight_core::Error as CoreError;
use shiftlight_types::DeviceIdentity;

use crate::commands::watch::{build_poller, watch_until_ctrl_c};
use crate::style;
use crate::util::AppContext;

pub async fn cmd_connect(
    ctx: &AppContext,
    address: &str,
    name: Option<String>,
    attempts: Option<u32>,
    watch: bool,
) -> Result<()> {
    let mut ctx = ctx.clone();
    if let Some(attempts) = attempts {
        ctx.config.connect_attempts = attempts;
    }
    let poller = build_poller(&ctx, None)?;

    // Fall back to the saved name so history keeps a readable label
    let name = match name {
        Some(name) => name,
        None => poller
            .sink()
            .lock()
            .await
            .get_device(address.trim())
            .map(|d| d.name().to_string())
            .unwrap_or_default(),
    };
    let device = DeviceIdentity::parse(address, &name).context("Invalid device")?;

    let events = poller.subscribe();
    let spinner = ctx.spinner(|| style::connecting_spinner(&device.name));
    let result = poller.connect(&device).await;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    if let Err(e) = result {
        // The record error already says the attempt was not saved
        let message = match &e {
            CoreError::Record { .. } => format!("Bridge could not connect to {}", device),
            _ => format!(
                "Bridge could not connect to {}. The failed attempt was recorded.",
                device
            ),
        };
        return Err(anyhow::Error::new(e).context(message));
    }

    ctx.note(&format!("Connect request for {} accepted", device));
    if !watch {
        ctx.note("Run 'shiftlight watch' to record the session.");
        return Ok(());
    }

    watch_until_ctrl_c(&poller, events, false, &ctx.opts).await
}
