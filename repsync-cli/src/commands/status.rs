//! Show device, program, and queue status.

use anyhow::Result;
use std::path::Path;

use crate::commands::{format_age, open_engine};
use crate::config::DeviceProfile;

/// Run the status command.
pub async fn run(data_dir: &Path) -> Result<()> {
    println!("=== repsync status ===");
    println!();

    let profile = match DeviceProfile::load(data_dir).await {
        Ok(profile) => profile,
        Err(_) => {
            println!("Device: NOT INITIALIZED");
            println!();
            println!("Run 'repsync init --name <name>' to initialize.");
            return Ok(());
        }
    };

    println!("Device:");
    println!("  ID:   {}", &profile.device_id[..8]);
    println!("  Name: {}", profile.device_name);
    println!("  Role: {:?}", profile.role);
    println!("  Init: {}", format_age(profile.created_at));
    println!();

    let engine = open_engine(data_dir).await?;

    match engine.active_workout().await? {
        Some((session, point)) => {
            println!("Workout:");
            println!("  Session: {}", session.id);
            println!("  Started: {}", session.started_at);
            println!("  Resume:  {point:?}");
        }
        None => println!("Workout: none active"),
    }
    println!();

    let queue = engine.queue_status().await;
    println!("Outbound queue:");
    println!("  Pending: {}", queue.pending);
    match queue.last_attempt_at {
        Some(at) => println!("  Last attempt: {at} (unix ms)"),
        None => println!("  Last attempt: never"),
    }
    println!();
    println!("Link: OFFLINE (no live transport in CLI mode)");

    Ok(())
}
