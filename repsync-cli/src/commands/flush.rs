//! Retry delivery of queued events.

use anyhow::Result;
use std::path::Path;

use crate::commands::open_engine;

/// Run the flush command.
pub async fn run(data_dir: &Path) -> Result<()> {
    let engine = open_engine(data_dir).await?;

    let before = engine.queue_status().await;
    let report = engine.flush().await;
    let after = engine.queue_status().await;

    println!("Flush attempted");
    println!("  Delivered: {}", report.delivered);
    println!("  Pending:   {} (was {})", after.pending, before.pending);
    if after.pending > 0 {
        println!();
        println!("Peer unreachable; items stay queued and will retry on reconnect.");
    }
    Ok(())
}
