//! End-to-end scenarios over an in-process link pair.
//!
//! A primary and a companion engine run against real (in-memory) stores
//! and a loopback transport; inbound events are pumped by hand so the
//! tests stay deterministic.

use std::sync::Arc;
use std::time::Duration;

use repsync_core::ResumePoint;
use repsync_engine::{EngineConfig, LoopbackTransport, SyncEngine};
use repsync_store::{RecordStore, SqliteStore};
use repsync_types::{
    DeviceId, DeviceRole, ExerciseId, ExercisePlan, SessionId, TemplateId, TemplateRecord,
};

struct Device {
    engine: Arc<SyncEngine<LoopbackTransport>>,
    store: Arc<dyn RecordStore>,
}

async fn linked_devices() -> (Device, Device) {
    let (primary_end, companion_end) = LoopbackTransport::pair();

    let mut devices = Vec::new();
    for (role, end) in [
        (DeviceRole::Primary, primary_end),
        (DeviceRole::Companion, companion_end),
    ] {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
        let config = EngineConfig::new(DeviceId::new(), role)
            .with_immediate_timeout(Duration::from_millis(200));
        let engine = Arc::new(
            SyncEngine::new(config, Arc::clone(&store), Arc::new(end))
                .await
                .unwrap(),
        );
        engine.activate().await.unwrap();
        devices.push(Device { engine, store });
    }

    let companion = devices.pop().unwrap();
    let primary = devices.pop().unwrap();
    (primary, companion)
}

/// Deliver everything sitting in a device's inbox.
async fn pump(device: &Device) {
    while let Some(event) = device.engine.transport().try_recv().await {
        device.engine.handle_incoming(event).await.unwrap();
    }
}

fn catalog_template(name: &str, owner: DeviceId, exercises: &[(&str, u32)]) -> TemplateRecord {
    TemplateRecord {
        template_id: TemplateId::new(),
        owner_id: owner,
        name: name.into(),
        day_of_week: Some(1),
        exercises: exercises
            .iter()
            .enumerate()
            .map(|(i, (n, target_sets))| ExercisePlan {
                exercise_id: ExerciseId::new(),
                name: (*n).into(),
                order_index: i as u32,
                target_sets: *target_sets,
                target_reps: 10,
                target_weight: 50.0,
            })
            .collect(),
    }
}

#[tokio::test]
async fn offline_sets_reach_primary_after_reconnect() {
    let (primary, companion) = linked_devices().await;

    // Start a workout while the link is up so both sides know the
    // session, then drop the link.
    companion.engine.transport().set_reachable(true);
    let template = catalog_template("Push", DeviceId::new(), &[("Bench", 3), ("OHP", 3)]);
    companion
        .engine
        .apply_local_template(&template)
        .await
        .unwrap();
    let session = companion
        .engine
        .start_workout(Some(template.template_id))
        .await
        .unwrap();
    pump(&primary).await;
    companion.engine.transport().set_reachable(false);

    // Three sets logged while unreachable: all three local writes
    // succeed and three items queue.
    for set in 1..=3 {
        companion
            .engine
            .log_set(session.id, 0, set, 10, 60.0)
            .await
            .unwrap();
    }
    assert_eq!(companion.store.log_entries(&session.id).await.unwrap().len(), 3);
    assert_eq!(companion.engine.queue_status().await.pending, 3);
    assert!(primary.store.log_entries(&session.id).await.unwrap().is_empty());

    // Reachability restored: the flush delivers all three in original
    // order.
    companion.engine.transport().set_reachable(true);
    let report = companion.engine.flush().await;
    assert!(report.ran);
    assert_eq!(report.delivered, 3);
    pump(&primary).await;

    let merged = primary.store.log_entries(&session.id).await.unwrap();
    assert_eq!(merged.len(), 3);
    let sets: Vec<u32> = merged.iter().map(|e| e.set_number).collect();
    assert_eq!(sets, vec![1, 2, 3]);

    // A second flush after everything was acknowledged is a no-op and
    // produces no duplicates.
    let report = companion.engine.flush().await;
    assert_eq!(report.delivered, 0);
    pump(&primary).await;
    assert_eq!(primary.store.log_entries(&session.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn template_round_trip_updates_single_exercise() {
    let (primary, companion) = linked_devices().await;
    primary.engine.transport().set_reachable(true);

    // Primary owns a 5-exercise template and pushes it.
    let owner = DeviceId::new();
    let template = catalog_template(
        "Full Body",
        owner,
        &[("Squat", 3), ("Bench", 3), ("Row", 3), ("OHP", 3), ("Curl", 3)],
    );
    primary.engine.apply_local_template(&template).await.unwrap();
    primary.engine.push_program().await.unwrap();
    pump(&companion).await;

    let first = companion
        .store
        .template_exercises(&template.template_id)
        .await
        .unwrap();
    assert_eq!(first.len(), 5);

    // The same template arrives again with exercise #3's target reps
    // changed.
    let mut edited = template.clone();
    edited.exercises[2].target_reps = 15;
    primary.engine.apply_local_template(&edited).await.unwrap();
    primary.engine.push_program().await.unwrap();
    pump(&companion).await;

    let second = companion
        .store
        .template_exercises(&template.template_id)
        .await
        .unwrap();
    assert_eq!(second.len(), 5);
    assert_eq!(second[2].target_reps, 15);
    for i in [0usize, 1, 3, 4] {
        assert_eq!(second[i].target_reps, first[i].target_reps);
    }
}

#[tokio::test]
async fn companion_resync_pulls_full_catalog() {
    let (primary, companion) = linked_devices().await;
    primary.engine.transport().set_reachable(true);

    let owner = DeviceId::new();
    for name in ["Push", "Pull", "Legs"] {
        let template = catalog_template(name, owner, &[("X", 3)]);
        primary.engine.apply_local_template(&template).await.unwrap();
    }

    // Companion starts empty and asks for everything.
    assert!(companion.store.templates().await.unwrap().is_empty());
    companion.engine.request_program_resync().await.unwrap();
    pump(&primary).await;
    pump(&companion).await;

    let names: Vec<String> = companion
        .store
        .templates()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["Legs", "Pull", "Push"]);

    // Asking twice converges on the same state (same idempotent merge
    // path as the direct push).
    companion.engine.request_program_resync().await.unwrap();
    pump(&primary).await;
    pump(&companion).await;
    assert_eq!(companion.store.templates().await.unwrap().len(), 3);
}

#[tokio::test]
async fn resume_survives_simulated_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("companion.db");

    let template = catalog_template("Legs", DeviceId::new(), &[("Squat", 3), ("Lunge", 4)]);
    let session_id: SessionId;

    {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::open(&db_path).await.unwrap());
        let (end, _peer) = LoopbackTransport::pair();
        let config = EngineConfig::new(DeviceId::new(), DeviceRole::Companion)
            .with_immediate_timeout(Duration::from_millis(200));
        let engine = SyncEngine::new(config, store, Arc::new(end)).await.unwrap();
        engine.activate().await.unwrap();

        engine.apply_local_template(&template).await.unwrap();
        let session = engine
            .start_workout(Some(template.template_id))
            .await
            .unwrap();
        session_id = session.id;

        engine.log_set(session_id, 0, 1, 10, 80.0).await.unwrap();
        engine.log_set(session_id, 0, 2, 10, 80.0).await.unwrap();
        engine.log_set(session_id, 0, 3, 10, 80.0).await.unwrap();
    }

    // Process restart: fresh engine over the same database, link never
    // comes up. The resume point is derived from the log alone.
    let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::open(&db_path).await.unwrap());
    let (end, _peer) = LoopbackTransport::pair();
    let config = EngineConfig::new(DeviceId::new(), DeviceRole::Companion);
    let engine = SyncEngine::new(config, store, Arc::new(end)).await.unwrap();

    let (session, point) = engine.active_workout().await.unwrap().unwrap();
    assert_eq!(session.id, session_id);
    assert_eq!(
        point,
        ResumePoint::At {
            exercise_index: 1,
            set_index: 0
        }
    );

    // The three queued set events also survived the restart.
    assert_eq!(engine.queue_status().await.pending, 4); // workout_start + 3 sets
}

#[tokio::test]
async fn request_sync_rebuilds_companion_session() {
    let (primary, companion) = linked_devices().await;
    primary.engine.transport().set_reachable(true);

    // The workout was started on the primary; the companion has no
    // local record of it.
    let template = catalog_template("Push", DeviceId::new(), &[("Bench", 3)]);
    primary.engine.apply_local_template(&template).await.unwrap();
    let session = primary
        .engine
        .start_workout(Some(template.template_id))
        .await
        .unwrap();
    // Drop the start event the primary sent on its own.
    while companion.engine.transport().try_recv().await.is_some() {}

    assert!(companion.store.session(&session.id).await.unwrap().is_none());

    companion.engine.request_active_workout().await.unwrap();
    pump(&primary).await;
    pump(&companion).await;

    let rebuilt = companion.store.session(&session.id).await.unwrap().unwrap();
    assert!(rebuilt.is_active());
    assert_eq!(companion.store.plan(&session.id).await.unwrap().len(), 1);
}
