//! Count command - shows how many sessions are stored.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use super::Context;

/// Arguments for the count command.
#[derive(Args, Debug)]
pub struct CountArgs {}

#[derive(Debug, Serialize)]
struct CountOutput {
    table: String,
    sessions: u64,
}

/// Run the count command.
pub async fn run(_args: CountArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store().await?;
    let sessions = store.length().await?;
    store.close().await;

    if ctx.json_output {
        let output = CountOutput {
            table: ctx.config.table().to_string(),
            sessions,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let dim = Style::new().dim();
        println!("{}", style("Session Store").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("  {} {}", dim.apply_to("Database:"), ctx.db_path.display());
        println!("  {} {}", dim.apply_to("Table:"), ctx.config.table());
        println!("  {} {}", dim.apply_to("Sessions:"), sessions);
        if ctx.verbose {
            println!(
                "  {}",
                dim.apply_to("Expired sessions are counted until swept.")
            );
        }
    }
    Ok(())
}
