//! Watch command - keeps the expiration sweeper running until Ctrl+C.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use console::Style;
use tracing::info;

use super::Context;

/// Arguments for the watch command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Sweep interval in milliseconds (defaults to the configured clear_interval)
    #[arg(long)]
    pub interval: Option<u64>,
}

/// Run the watch command.
pub async fn run(args: WatchArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(ms) = args.interval {
        config = config.with_clear_interval(Duration::from_millis(ms));
    }

    let store = ctx.open_store_with(config).await?;
    let dim = Style::new().dim();
    println!(
        "Sweeping table '{}' every {:?}",
        store.config().table(),
        store.config().clear_interval()
    );
    println!("{}", dim.apply_to("Press Ctrl+C to stop."));

    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received");
    store.close().await;
    println!("Stopped.");
    Ok(())
}
