//! Set command - writes a session payload.

use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use console::Style;
use serde_json::Value;

use super::Context;

/// Arguments for the set command.
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Session ID
    pub id: String,

    /// Session payload as JSON
    pub payload: String,

    /// Max-age in milliseconds (overrides any cookie.originalMaxAge hint)
    #[arg(long)]
    pub max_age: Option<u64>,
}

/// Run the set command.
pub async fn run(args: SetArgs, ctx: &Context) -> Result<()> {
    let payload: Value =
        serde_json::from_str(&args.payload).context("session payload is not valid JSON")?;

    let store = ctx.open_store().await?;
    match args.max_age {
        Some(ms) => {
            store
                .set_with_max_age(&args.id, payload, Duration::from_millis(ms))
                .await?
        }
        None => store.set(&args.id, payload).await?,
    }
    store.close().await;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "id": args.id, "stored": true }));
    } else {
        let green = Style::new().green();
        println!("{} Session stored: {}", green.apply_to("✓"), args.id);
    }
    Ok(())
}
