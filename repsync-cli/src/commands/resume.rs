//! Show where to continue the active workout.

use anyhow::Result;
use std::path::Path;

use repsync_core::ResumePoint;

use crate::commands::open_engine;

/// Run the resume command.
pub async fn run(data_dir: &Path) -> Result<()> {
    let engine = open_engine(data_dir).await?;

    let Some((session, point)) = engine.active_workout().await? else {
        println!("No active workout.");
        return Ok(());
    };

    println!("Active session {}", session.id);
    match point {
        ResumePoint::At {
            exercise_index,
            set_index,
        } => {
            println!(
                "Continue at exercise {}, set {} (next set is #{})",
                exercise_index,
                set_index,
                set_index + 1
            );
        }
        ResumePoint::Complete => {
            println!("Every planned set is logged - the workout can be completed.");
        }
    }
    Ok(())
}
