//! Destroy command - deletes one session.

use anyhow::Result;
use clap::Args;
use console::Style;

use super::Context;

/// Arguments for the destroy command.
#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Session ID
    pub id: String,
}

/// Run the destroy command.
pub async fn run(args: DestroyArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store().await?;
    store.destroy(&args.id).await?;
    store.close().await;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "id": args.id, "destroyed": true }));
    } else {
        let green = Style::new().green();
        println!("{} Session destroyed: {}", green.apply_to("✓"), args.id);
    }
    Ok(())
}
