//! Log one completed set against the active workout.

use anyhow::{bail, Result};
use std::path::Path;

use crate::commands::open_engine;

/// Run the log command.
pub async fn run(
    data_dir: &Path,
    exercise_index: u32,
    set_number: u32,
    reps: u32,
    weight: f64,
) -> Result<()> {
    let engine = open_engine(data_dir).await?;

    let Some((session, _)) = engine.active_workout().await? else {
        bail!("No active workout. Run 'repsync start' first.");
    };

    let entry = engine
        .log_set(session.id, exercise_index, set_number, reps, weight)
        .await?;
    let queue = engine.queue_status().await;

    println!(
        "Logged exercise {} set {} ({} reps @ {})",
        exercise_index, set_number, reps, weight
    );
    println!("  Entry:  {}", entry.id);
    println!("  Queued: {} pending", queue.pending);
    Ok(())
}
