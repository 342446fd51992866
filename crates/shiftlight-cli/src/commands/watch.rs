//! Watch command implementation.
//!
//! Polls the bridge until Ctrl+C, recording every detected connection
//! attempt in the history database and printing monitor events.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use shiftlight_core::{BridgeClient, EventReceiver, MonitorEvent, Poller, PollerConfig};
use shiftlight_store::HistoryStore;

use crate::format::{FormatOptions, format_event_line};
use crate::util::AppContext;

pub(crate) type CliPoller = Poller<BridgeClient, HistoryStore>;

/// Poller over the configured bridge and history database.
pub(crate) fn build_poller(ctx: &AppContext, interval: Option<u64>) -> Result<CliPoller> {
    let config = PollerConfig::new()
        .interval_secs(interval.unwrap_or(ctx.config.poll_interval))
        .connect_attempts(ctx.config.connect_attempts);
    let store = ctx.open_store()?;

    Poller::new(ctx.bridge()?, Arc::new(Mutex::new(store)), config)
        .context("Invalid polling configuration")
}

pub async fn cmd_watch(ctx: &AppContext, interval: Option<u64>, json: bool) -> Result<()> {
    let poller = build_poller(ctx, interval)?;
    let events = poller.subscribe();

    if !ctx.quiet {
        eprintln!(
            "Watching {} every {}s (Ctrl+C to stop)",
            ctx.bridge_url,
            poller.config().interval.as_secs()
        );
    }

    watch_until_ctrl_c(&poller, events, json, &ctx.opts).await
}

/// Run the poller and print its events until Ctrl+C.
pub(crate) async fn watch_until_ctrl_c(
    poller: &CliPoller,
    mut events: EventReceiver,
    json: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nShutting down...");
        }
        token.cancel();
    });

    let printer = async {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event, json, opts)?,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event output fell behind, {} event(s) skipped", skipped);
                }
                Err(RecvError::Closed) => return Ok::<(), anyhow::Error>(()),
            }
        }
    };

    tokio::select! {
        _ = poller.run(cancel) => {}
        result = printer => result?,
    }

    // Events from the final tick
    loop {
        match events.try_recv() {
            Ok(event) => print_event(&event, json, opts)?,
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    Ok(())
}

fn print_event(event: &MonitorEvent, json: bool, opts: &FormatOptions) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        print!("{}", format_event_line(event, opts));
    }
    Ok(())
}
