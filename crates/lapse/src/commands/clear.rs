//! Clear command - deletes every session in the table.

use anyhow::{Result, bail};
use clap::Args;
use console::Style;

use super::Context;

/// Arguments for the clear command.
#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Skip confirmation (required, the deletion cannot be undone)
    #[arg(long)]
    pub yes: bool,
}

/// Run the clear command.
pub async fn run(args: ClearArgs, ctx: &Context) -> Result<()> {
    if !args.yes {
        bail!(
            "refusing to delete every session in table '{}' without --yes",
            ctx.config.table()
        );
    }

    let store = ctx.open_store().await?;
    let deleted = store.clear().await?;
    store.close().await;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "deleted": deleted }));
    } else {
        let green = Style::new().green();
        println!("{} Cleared {} session(s)", green.apply_to("✓"), deleted);
    }
    Ok(())
}
