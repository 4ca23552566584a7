//! Sweep command - deletes expired sessions once.

use anyhow::Result;
use clap::Args;
use console::Style;

use super::Context;

/// Arguments for the sweep command.
#[derive(Args, Debug)]
pub struct SweepArgs {}

/// Run the sweep command.
pub async fn run(_args: SweepArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store().await?;
    let deleted = store.sweep().await?;
    store.close().await;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "deleted": deleted }));
    } else {
        let green = Style::new().green();
        println!(
            "{} Deleted {} expired session(s)",
            green.apply_to("✓"),
            deleted
        );
    }
    Ok(())
}
