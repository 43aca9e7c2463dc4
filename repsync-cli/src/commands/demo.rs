//! Two-device sync demo.
//!
//! Runs a primary and a companion engine in one process over a loopback
//! link and walks the offline-logging scenario end to end: template
//! push, workout started on the companion, sets logged while the link is
//! down, queue drained on reconnect.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use repsync_engine::{EngineConfig, LoopbackTransport, SyncEngine};
use repsync_store::{RecordStore, SqliteStore};
use repsync_types::{
    DeviceId, DeviceRole, ExerciseId, ExercisePlan, TemplateId, TemplateRecord,
};

struct Device {
    engine: Arc<SyncEngine<LoopbackTransport>>,
    store: Arc<dyn RecordStore>,
}

async fn device(role: DeviceRole, end: LoopbackTransport) -> Result<Device> {
    let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().await?);
    let config =
        EngineConfig::new(DeviceId::new(), role).with_immediate_timeout(Duration::from_millis(500));
    let engine = Arc::new(SyncEngine::new(config, Arc::clone(&store), Arc::new(end)).await?);
    engine.activate().await?;
    Ok(Device { engine, store })
}

async fn pump(device: &Device) -> Result<()> {
    while let Some(event) = device.engine.transport().try_recv().await {
        device.engine.handle_incoming(event).await?;
    }
    Ok(())
}

/// Run the demo command.
pub async fn run() -> Result<()> {
    let (primary_end, companion_end) = LoopbackTransport::pair();
    let primary = device(DeviceRole::Primary, primary_end).await?;
    let companion = device(DeviceRole::Companion, companion_end).await?;

    println!("[1] Link up; primary pushes its program");
    primary.engine.transport().set_reachable(true);
    let owner = DeviceId::new();
    let template = TemplateRecord {
        template_id: TemplateId::new(),
        owner_id: owner,
        name: "Push Day".into(),
        day_of_week: Some(1),
        exercises: [("Bench Press", 3u32), ("Overhead Press", 3), ("Dips", 2)]
            .iter()
            .enumerate()
            .map(|(i, (name, sets))| ExercisePlan {
                exercise_id: ExerciseId::new(),
                name: (*name).into(),
                order_index: i as u32,
                target_sets: *sets,
                target_reps: 8,
                target_weight: 60.0,
            })
            .collect(),
    };
    primary.engine.apply_local_template(&template).await?;
    primary.engine.push_program().await?;
    pump(&companion).await?;
    println!(
        "    companion now holds {} template(s)",
        companion.store.templates().await?.len()
    );

    println!("[2] Companion starts the workout from the template");
    let session = companion
        .engine
        .start_workout(Some(template.template_id))
        .await?;
    pump(&primary).await?;

    println!("[3] Link drops; companion logs 3 sets offline");
    companion.engine.transport().set_reachable(false);
    for set in 1..=3 {
        companion.engine.log_set(session.id, 0, set, 8, 60.0).await?;
    }
    println!(
        "    companion log: {} entries, queue: {} pending; primary log: {} entries",
        companion.store.log_entries(&session.id).await?.len(),
        companion.engine.queue_status().await.pending,
        primary.store.log_entries(&session.id).await?.len(),
    );

    println!("[4] Link restored; queue drains in order");
    companion.engine.transport().set_reachable(true);
    let report = companion.engine.flush().await;
    pump(&primary).await?;
    println!(
        "    delivered {} event(s); primary log: {} entries",
        report.delivered,
        primary.store.log_entries(&session.id).await?.len(),
    );

    println!("[5] Resume point is derived from the log alone");
    let point = companion.engine.resume_point(session.id).await?;
    println!("    {point:?}");

    println!();
    println!("Demo complete.");
    Ok(())
}
