//! Get command - prints a stored session payload.

use anyhow::{Result, bail};
use clap::Args;

use super::Context;

/// Arguments for the get command.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Session ID
    pub id: String,
}

/// Run the get command.
pub async fn run(args: GetArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store().await?;
    let session = store.get(&args.id).await?;
    store.close().await;

    match session {
        Some(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        None => {
            if ctx.json_output {
                println!("null");
            }
            bail!("Session not found: {}", args.id);
        }
    }
}
