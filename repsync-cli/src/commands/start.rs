//! Begin a workout.

use anyhow::{Context, Result};
use std::path::Path;

use repsync_types::TemplateId;

use crate::commands::open_engine;

/// Run the start command.
pub async fn run(data_dir: &Path, template: Option<&str>) -> Result<()> {
    let engine = open_engine(data_dir).await?;

    let template_id: Option<TemplateId> = template
        .map(|s| s.parse().context("Invalid template id"))
        .transpose()?;

    let session = engine.start_workout(template_id).await?;
    let queue = engine.queue_status().await;

    println!("Workout started");
    println!("  Session: {}", session.id);
    if let Some(id) = template_id {
        println!("  Template: {id}");
    }
    println!("  Start event queued ({} pending)", queue.pending);
    Ok(())
}
