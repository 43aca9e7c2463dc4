//! # repsync-store
//!
//! Durable record store for repsync.
//!
//! Each device keeps an independent local store of workout sessions,
//! the append-only set log, program templates, and the offline outbound
//! queue. Two backends implement the same [`RecordStore`] contract:
//!
//! - [`SqliteStore`] - the structured backend (sqlx, WAL mode)
//! - [`KvStore`] - a flat key-value file used as a fallback when the
//!   structured backend fails to initialize; exact-key lookups are its
//!   only primitive, list operations are prefix scans
//!
//! [`open_with_fallback`] selects the backend at construction time and
//! logs a degraded-mode warning exactly once when falling back. The
//! fallback is transparent to callers and implies no extra durability:
//! neither backend survives an app reinstall or OS-level data reset.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod kv;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use kv::KvStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use repsync_types::{
    ExerciseId, ExerciseLogEntry, ExercisePlan, ProgramTemplate, SessionId, SyncEvent,
    TemplateExercise, TemplateId, WorkoutSession,
};

/// Database file name used by the structured backend.
pub const DB_FILE: &str = "repsync.db";
/// File name used by the key-value fallback backend.
pub const KV_FILE: &str = "repsync-kv.json";

/// An outbound event as persisted in the offline queue.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOutboxItem {
    /// Store-assigned, monotone sequence number; defines flush order.
    pub seq: u64,
    /// The queued event.
    pub event: SyncEvent,
    /// When the event was enqueued (unix ms).
    pub enqueued_at: i64,
    /// When delivery was last attempted, if ever (unix ms).
    pub last_attempt_at: Option<i64>,
}

/// Contract for the durable record store.
///
/// Every call runs as a single-writer transaction; [`save`] commits any
/// writes the backend may still be buffering. Callers hold the single
/// logical writer for a device - the backends do not arbitrate between
/// concurrent writers.
///
/// [`save`]: RecordStore::save
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or update a workout session.
    ///
    /// Callers maintain the status invariant (a completed session is
    /// never written back to active).
    async fn put_session(&self, session: &WorkoutSession) -> StoreResult<()>;

    /// Fetch a session by id.
    async fn session(&self, id: &SessionId) -> StoreResult<Option<WorkoutSession>>;

    /// The most recently started session still in the active state.
    async fn active_session(&self) -> StoreResult<Option<WorkoutSession>>;

    /// Persist the ordered exercise plan a session was started with.
    ///
    /// Replaces any previously stored plan for the session.
    async fn put_plan(&self, session_id: &SessionId, plan: &[ExercisePlan]) -> StoreResult<()>;

    /// The session's plan, ordered by `order_index`.
    async fn plan(&self, session_id: &SessionId) -> StoreResult<Vec<ExercisePlan>>;

    /// Append one set-log entry.
    ///
    /// Idempotent by entry identity: re-inserting an existing id is a
    /// no-op. Returns whether a row was actually inserted.
    async fn append_log_entry(&self, entry: &ExerciseLogEntry) -> StoreResult<bool>;

    /// The session's full log, ordered by creation time.
    async fn log_entries(&self, session_id: &SessionId) -> StoreResult<Vec<ExerciseLogEntry>>;

    /// Insert or update a program template header.
    async fn put_template(&self, template: &ProgramTemplate) -> StoreResult<()>;

    /// Fetch a template by id.
    async fn template(&self, id: &TemplateId) -> StoreResult<Option<ProgramTemplate>>;

    /// All templates, ordered by name.
    async fn templates(&self) -> StoreResult<Vec<ProgramTemplate>>;

    /// Remove a template and its exercises (explicit deletion flow).
    async fn delete_template(&self, id: &TemplateId) -> StoreResult<()>;

    /// Insert or update a template exercise.
    async fn put_template_exercise(&self, exercise: &TemplateExercise) -> StoreResult<()>;

    /// Fetch a template exercise by id.
    async fn template_exercise(&self, id: &ExerciseId) -> StoreResult<Option<TemplateExercise>>;

    /// A template's exercises, ordered by `order_index`.
    async fn template_exercises(
        &self,
        template_id: &TemplateId,
    ) -> StoreResult<Vec<TemplateExercise>>;

    /// Remove a single template exercise (explicit deletion flow).
    async fn delete_template_exercise(&self, id: &ExerciseId) -> StoreResult<()>;

    /// Append an event to the offline outbound queue.
    ///
    /// Returns the assigned sequence number. Never blocks on network
    /// state.
    async fn outbox_push(&self, event: &SyncEvent, enqueued_at: i64) -> StoreResult<u64>;

    /// All queued events, in enqueue order.
    async fn outbox_items(&self) -> StoreResult<Vec<StoredOutboxItem>>;

    /// Remove a queued event after positive delivery acknowledgment.
    async fn outbox_remove(&self, seq: u64) -> StoreResult<()>;

    /// Record a delivery attempt timestamp for a queued event.
    async fn outbox_mark_attempt(&self, seq: u64, attempted_at: i64) -> StoreResult<()>;

    /// Number of queued events.
    async fn outbox_len(&self) -> StoreResult<usize>;

    /// Commit pending writes to the underlying medium.
    async fn save(&self) -> StoreResult<()>;
}

/// Open the device store, falling back to the key-value backend when the
/// structured backend fails to initialize.
///
/// The degraded-mode warning is logged exactly once per process. If both
/// backends fail the error is [`StoreError::Unrecoverable`] and the
/// caller must surface recovery guidance instead of running without
/// persistence.
pub async fn open_with_fallback(data_dir: &Path) -> StoreResult<Arc<dyn RecordStore>> {
    match SqliteStore::open(&data_dir.join(DB_FILE)).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(primary) => {
            warn_degraded_once(&primary);
            match KvStore::open(&data_dir.join(KV_FILE)).await {
                Ok(store) => Ok(Arc::new(store)),
                Err(fallback) => Err(StoreError::Unrecoverable {
                    primary: primary.to_string(),
                    fallback: fallback.to_string(),
                }),
            }
        }
    }
}

fn warn_degraded_once(cause: &StoreError) {
    static DEGRADED: std::sync::Once = std::sync::Once::new();
    DEGRADED.call_once(|| {
        tracing::warn!(
            %cause,
            "structured store failed to initialize; falling back to key-value store \
             (exact-key lookups only, no extra durability)"
        );
    });
}
