//! SQLite backend for the durable record store.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use repsync_types::{
    EntryId, ExerciseId, ExerciseLogEntry, ExercisePlan, ProgramTemplate, SessionId, SessionStatus,
    SyncEvent, TemplateExercise, TemplateId, WorkoutSession,
};

use crate::error::{StoreError, StoreResult};
use crate::{RecordStore, StoredOutboxItem};

/// SQLite-backed record store.
///
/// Uses WAL mode; every operation commits before returning, so `save`
/// has nothing left to flush beyond a WAL checkpoint.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) a store at the given database path.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::from_str(path.to_str().unwrap_or(crate::DB_FILE))
            .map_err(StoreError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StoreError::Database)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StoreError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StoreError::Database)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id BLOB PRIMARY KEY,
                status INTEGER NOT NULL,
                template_id BLOB,
                started_at INTEGER NOT NULL,
                last_resumed_at INTEGER,
                active_duration_secs INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS log_entries (
                id BLOB PRIMARY KEY,
                session_id BLOB NOT NULL,
                exercise_order_index INTEGER NOT NULL,
                set_number INTEGER NOT NULL,
                weight REAL NOT NULL,
                reps INTEGER NOT NULL,
                completed INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_plans (
                session_id BLOB NOT NULL,
                order_index INTEGER NOT NULL,
                exercise_id BLOB NOT NULL,
                name TEXT NOT NULL,
                target_sets INTEGER NOT NULL,
                target_reps INTEGER NOT NULL,
                target_weight REAL NOT NULL,
                PRIMARY KEY (session_id, order_index)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS templates (
                id BLOB PRIMARY KEY,
                owner_id BLOB NOT NULL,
                name TEXT NOT NULL,
                day_of_week INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS template_exercises (
                id BLOB PRIMARY KEY,
                template_id BLOB NOT NULL,
                order_index INTEGER NOT NULL,
                name TEXT NOT NULL,
                target_sets INTEGER NOT NULL,
                target_reps INTEGER NOT NULL,
                target_weight REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                event BLOB NOT NULL,
                enqueued_at INTEGER NOT NULL,
                last_attempt_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_log_session ON log_entries(session_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tex_template ON template_exercises(template_id, order_index)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn put_session(&self, session: &WorkoutSession) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, status, template_id, started_at, last_resumed_at, active_duration_secs)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                template_id = excluded.template_id,
                started_at = excluded.started_at,
                last_resumed_at = excluded.last_resumed_at,
                active_duration_secs = excluded.active_duration_secs
            "#,
        )
        .bind(session.id.as_bytes())
        .bind(status_to_i64(session.status))
        .bind(session.template_id.as_ref().map(|t| t.as_bytes().to_vec()))
        .bind(session.started_at)
        .bind(session.last_resumed_at)
        .bind(session.active_duration_secs as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn session(&self, id: &SessionId) -> StoreResult<Option<WorkoutSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, status, template_id, started_at, last_resumed_at, active_duration_secs
            FROM sessions WHERE id = ?1
            "#,
        )
        .bind(id.as_bytes())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn active_session(&self) -> StoreResult<Option<WorkoutSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, status, template_id, started_at, last_resumed_at, active_duration_secs
            FROM sessions WHERE status = 0
            ORDER BY started_at DESC LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn put_plan(&self, session_id: &SessionId, plan: &[ExercisePlan]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM session_plans WHERE session_id = ?1")
            .bind(session_id.as_bytes())
            .execute(&mut *tx)
            .await?;

        for row in plan {
            sqlx::query(
                r#"
                INSERT INTO session_plans
                    (session_id, order_index, exercise_id, name, target_sets, target_reps, target_weight)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(session_id.as_bytes())
            .bind(row.order_index as i64)
            .bind(row.exercise_id.as_bytes())
            .bind(&row.name)
            .bind(row.target_sets as i64)
            .bind(row.target_reps as i64)
            .bind(row.target_weight)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn plan(&self, session_id: &SessionId) -> StoreResult<Vec<ExercisePlan>> {
        let rows = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT exercise_id, name, order_index, target_sets, target_reps, target_weight
            FROM session_plans WHERE session_id = ?1
            ORDER BY order_index ASC
            "#,
        )
        .bind(session_id.as_bytes())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn append_log_entry(&self, entry: &ExerciseLogEntry) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO log_entries
                (id, session_id, exercise_order_index, set_number, weight, reps, completed, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(entry.id.as_bytes())
        .bind(entry.session_id.as_bytes())
        .bind(entry.exercise_order_index as i64)
        .bind(entry.set_number as i64)
        .bind(entry.weight)
        .bind(entry.reps as i64)
        .bind(entry.completed as i64)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn log_entries(&self, session_id: &SessionId) -> StoreResult<Vec<ExerciseLogEntry>> {
        let rows = sqlx::query_as::<_, LogRow>(
            r#"
            SELECT id, session_id, exercise_order_index, set_number, weight, reps, completed, created_at
            FROM log_entries WHERE session_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(session_id.as_bytes())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn put_template(&self, template: &ProgramTemplate) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO templates (id, owner_id, name, day_of_week)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                name = excluded.name,
                day_of_week = excluded.day_of_week
            "#,
        )
        .bind(template.id.as_bytes())
        .bind(template.owner_id.as_bytes())
        .bind(&template.name)
        .bind(template.day_of_week.map(|d| d as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn template(&self, id: &TemplateId) -> StoreResult<Option<ProgramTemplate>> {
        let row = sqlx::query_as::<_, TemplateRow>(
            "SELECT id, owner_id, name, day_of_week FROM templates WHERE id = ?1",
        )
        .bind(id.as_bytes())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn templates(&self) -> StoreResult<Vec<ProgramTemplate>> {
        let rows = sqlx::query_as::<_, TemplateRow>(
            "SELECT id, owner_id, name, day_of_week FROM templates ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete_template(&self, id: &TemplateId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM template_exercises WHERE template_id = ?1")
            .bind(id.as_bytes())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM templates WHERE id = ?1")
            .bind(id.as_bytes())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn put_template_exercise(&self, exercise: &TemplateExercise) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO template_exercises
                (id, template_id, order_index, name, target_sets, target_reps, target_weight)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                template_id = excluded.template_id,
                order_index = excluded.order_index,
                name = excluded.name,
                target_sets = excluded.target_sets,
                target_reps = excluded.target_reps,
                target_weight = excluded.target_weight
            "#,
        )
        .bind(exercise.id.as_bytes())
        .bind(exercise.template_id.as_bytes())
        .bind(exercise.order_index as i64)
        .bind(&exercise.name)
        .bind(exercise.target_sets as i64)
        .bind(exercise.target_reps as i64)
        .bind(exercise.target_weight)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn template_exercise(&self, id: &ExerciseId) -> StoreResult<Option<TemplateExercise>> {
        let row = sqlx::query_as::<_, ExerciseRow>(
            r#"
            SELECT id, template_id, order_index, name, target_sets, target_reps, target_weight
            FROM template_exercises WHERE id = ?1
            "#,
        )
        .bind(id.as_bytes())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn template_exercises(
        &self,
        template_id: &TemplateId,
    ) -> StoreResult<Vec<TemplateExercise>> {
        let rows = sqlx::query_as::<_, ExerciseRow>(
            r#"
            SELECT id, template_id, order_index, name, target_sets, target_reps, target_weight
            FROM template_exercises WHERE template_id = ?1
            ORDER BY order_index ASC
            "#,
        )
        .bind(template_id.as_bytes())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete_template_exercise(&self, id: &ExerciseId) -> StoreResult<()> {
        sqlx::query("DELETE FROM template_exercises WHERE id = ?1")
            .bind(id.as_bytes())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn outbox_push(&self, event: &SyncEvent, enqueued_at: i64) -> StoreResult<u64> {
        let bytes = event.to_bytes()?;
        let result = sqlx::query("INSERT INTO outbox (event, enqueued_at) VALUES (?1, ?2)")
            .bind(&bytes)
            .bind(enqueued_at)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid() as u64)
    }

    async fn outbox_items(&self) -> StoreResult<Vec<StoredOutboxItem>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            "SELECT seq, event, enqueued_at, last_attempt_at FROM outbox ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn outbox_remove(&self, seq: u64) -> StoreResult<()> {
        sqlx::query("DELETE FROM outbox WHERE seq = ?1")
            .bind(seq as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn outbox_mark_attempt(&self, seq: u64, attempted_at: i64) -> StoreResult<()> {
        sqlx::query("UPDATE outbox SET last_attempt_at = ?2 WHERE seq = ?1")
            .bind(seq as i64)
            .bind(attempted_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn outbox_len(&self) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbox")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn save(&self) -> StoreResult<()> {
        // Every operation commits eagerly; checkpoint the WAL so the
        // main database file reflects all writes.
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn status_to_i64(status: SessionStatus) -> i64 {
    match status {
        SessionStatus::Active => 0,
        SessionStatus::Completed => 1,
    }
}

fn status_from_i64(value: i64) -> StoreResult<SessionStatus> {
    match value {
        0 => Ok(SessionStatus::Active),
        1 => Ok(SessionStatus::Completed),
        other => Err(StoreError::Corrupt {
            context: format!("session status {other}"),
        }),
    }
}

fn corrupt(context: &str) -> StoreError {
    StoreError::Corrupt {
        context: context.to_string(),
    }
}

/// Internal row types for SQLite queries.
#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Vec<u8>,
    status: i64,
    template_id: Option<Vec<u8>>,
    started_at: i64,
    last_resumed_at: Option<i64>,
    active_duration_secs: i64,
}

impl TryFrom<SessionRow> for WorkoutSession {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let template_id = match row.template_id {
            Some(bytes) => {
                Some(TemplateId::from_bytes(&bytes).ok_or_else(|| corrupt("session template_id"))?)
            }
            None => None,
        };
        Ok(WorkoutSession {
            id: SessionId::from_bytes(&row.id).ok_or_else(|| corrupt("session id"))?,
            status: status_from_i64(row.status)?,
            template_id,
            started_at: row.started_at,
            last_resumed_at: row.last_resumed_at,
            active_duration_secs: row.active_duration_secs as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PlanRow {
    exercise_id: Vec<u8>,
    name: String,
    order_index: i64,
    target_sets: i64,
    target_reps: i64,
    target_weight: f64,
}

impl TryFrom<PlanRow> for ExercisePlan {
    type Error = StoreError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        Ok(ExercisePlan {
            exercise_id: ExerciseId::from_bytes(&row.exercise_id)
                .ok_or_else(|| corrupt("plan exercise_id"))?,
            name: row.name,
            order_index: row.order_index as u32,
            target_sets: row.target_sets as u32,
            target_reps: row.target_reps as u32,
            target_weight: row.target_weight,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: Vec<u8>,
    session_id: Vec<u8>,
    exercise_order_index: i64,
    set_number: i64,
    weight: f64,
    reps: i64,
    completed: i64,
    created_at: i64,
}

impl TryFrom<LogRow> for ExerciseLogEntry {
    type Error = StoreError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        Ok(ExerciseLogEntry {
            id: EntryId::from_bytes(&row.id).ok_or_else(|| corrupt("log entry id"))?,
            session_id: SessionId::from_bytes(&row.session_id)
                .ok_or_else(|| corrupt("log entry session_id"))?,
            exercise_order_index: row.exercise_order_index as u32,
            set_number: row.set_number as u32,
            weight: row.weight,
            reps: row.reps as u32,
            completed: row.completed != 0,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: Vec<u8>,
    owner_id: Vec<u8>,
    name: String,
    day_of_week: Option<i64>,
}

impl TryFrom<TemplateRow> for ProgramTemplate {
    type Error = StoreError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(ProgramTemplate {
            id: TemplateId::from_bytes(&row.id).ok_or_else(|| corrupt("template id"))?,
            owner_id: repsync_types::DeviceId::from_bytes(&row.owner_id)
                .ok_or_else(|| corrupt("template owner_id"))?,
            name: row.name,
            day_of_week: row.day_of_week.map(|d| d as u8),
        })
    }
}

#[derive(sqlx::FromRow)]
struct ExerciseRow {
    id: Vec<u8>,
    template_id: Vec<u8>,
    order_index: i64,
    name: String,
    target_sets: i64,
    target_reps: i64,
    target_weight: f64,
}

impl TryFrom<ExerciseRow> for TemplateExercise {
    type Error = StoreError;

    fn try_from(row: ExerciseRow) -> Result<Self, Self::Error> {
        Ok(TemplateExercise {
            id: ExerciseId::from_bytes(&row.id).ok_or_else(|| corrupt("template exercise id"))?,
            template_id: TemplateId::from_bytes(&row.template_id)
                .ok_or_else(|| corrupt("template exercise template_id"))?,
            order_index: row.order_index as u32,
            name: row.name,
            target_sets: row.target_sets as u32,
            target_reps: row.target_reps as u32,
            target_weight: row.target_weight,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    seq: i64,
    event: Vec<u8>,
    enqueued_at: i64,
    last_attempt_at: Option<i64>,
}

impl TryFrom<OutboxRow> for StoredOutboxItem {
    type Error = StoreError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        Ok(StoredOutboxItem {
            seq: row.seq as u64,
            event: SyncEvent::from_bytes(&row.event)?,
            enqueued_at: row.enqueued_at,
            last_attempt_at: row.last_attempt_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repsync_types::{DeviceId, FetchProgram, RequestSync};
    use tempfile::tempdir;

    fn make_entry(session_id: SessionId, index: u32, set: u32, at: i64) -> ExerciseLogEntry {
        ExerciseLogEntry {
            id: EntryId::new(),
            session_id,
            exercise_order_index: index,
            set_number: set,
            weight: 80.0,
            reps: 5,
            completed: true,
            created_at: at,
        }
    }

    #[tokio::test]
    async fn session_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let session = WorkoutSession::start(Some(TemplateId::new()), 1_700_000_000_000);

        store.put_session(&session).await.unwrap();
        let loaded = store.session(&session.id).await.unwrap().unwrap();

        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn active_session_picks_most_recent() {
        let store = SqliteStore::in_memory().await.unwrap();

        let mut older = WorkoutSession::start(None, 1_000);
        older.status = SessionStatus::Completed;
        let newer = WorkoutSession::start(None, 2_000);

        store.put_session(&older).await.unwrap();
        store.put_session(&newer).await.unwrap();

        let active = store.active_session().await.unwrap().unwrap();
        assert_eq!(active.id, newer.id);
    }

    #[tokio::test]
    async fn no_active_session_when_all_completed() {
        let store = SqliteStore::in_memory().await.unwrap();

        let mut session = WorkoutSession::start(None, 1_000);
        session.status = SessionStatus::Completed;
        store.put_session(&session).await.unwrap();

        assert!(store.active_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn plan_replaces_previous() {
        let store = SqliteStore::in_memory().await.unwrap();
        let session_id = SessionId::new();

        let first = vec![ExercisePlan {
            exercise_id: ExerciseId::new(),
            name: "Squat".into(),
            order_index: 0,
            target_sets: 5,
            target_reps: 5,
            target_weight: 100.0,
        }];
        store.put_plan(&session_id, &first).await.unwrap();

        let second = vec![
            ExercisePlan {
                exercise_id: ExerciseId::new(),
                name: "Bench".into(),
                order_index: 0,
                target_sets: 3,
                target_reps: 8,
                target_weight: 60.0,
            },
            ExercisePlan {
                exercise_id: ExerciseId::new(),
                name: "Row".into(),
                order_index: 1,
                target_sets: 3,
                target_reps: 8,
                target_weight: 70.0,
            },
        ];
        store.put_plan(&session_id, &second).await.unwrap();

        let loaded = store.plan(&session_id).await.unwrap();
        assert_eq!(loaded, second);
    }

    #[tokio::test]
    async fn append_log_entry_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let session_id = SessionId::new();
        let entry = make_entry(session_id, 0, 1, 1_000);

        assert!(store.append_log_entry(&entry).await.unwrap());
        assert!(!store.append_log_entry(&entry).await.unwrap());

        let entries = store.log_entries(&session_id).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn log_entries_ordered_by_creation() {
        let store = SqliteStore::in_memory().await.unwrap();
        let session_id = SessionId::new();

        store
            .append_log_entry(&make_entry(session_id, 0, 2, 2_000))
            .await
            .unwrap();
        store
            .append_log_entry(&make_entry(session_id, 0, 1, 1_000))
            .await
            .unwrap();
        store
            .append_log_entry(&make_entry(session_id, 0, 3, 3_000))
            .await
            .unwrap();

        let entries = store.log_entries(&session_id).await.unwrap();
        let sets: Vec<u32> = entries.iter().map(|e| e.set_number).collect();
        assert_eq!(sets, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn template_upsert_overwrites_fields() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut template = ProgramTemplate {
            id: TemplateId::new(),
            owner_id: DeviceId::new(),
            name: "Push Day".into(),
            day_of_week: Some(1),
        };

        store.put_template(&template).await.unwrap();
        template.name = "Push Day B".into();
        store.put_template(&template).await.unwrap();

        let loaded = store.template(&template.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Push Day B");
        assert_eq!(store.templates().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn template_exercises_ordered_by_index() {
        let store = SqliteStore::in_memory().await.unwrap();
        let template_id = TemplateId::new();

        for (i, name) in [(2u32, "Curl"), (0, "Squat"), (1, "Bench")] {
            store
                .put_template_exercise(&TemplateExercise {
                    id: ExerciseId::new(),
                    template_id,
                    order_index: i,
                    name: name.into(),
                    target_sets: 3,
                    target_reps: 10,
                    target_weight: 40.0,
                })
                .await
                .unwrap();
        }

        let exercises = store.template_exercises(&template_id).await.unwrap();
        let names: Vec<&str> = exercises.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Squat", "Bench", "Curl"]);
    }

    #[tokio::test]
    async fn delete_template_removes_exercises_too() {
        let store = SqliteStore::in_memory().await.unwrap();
        let template_id = TemplateId::new();

        store
            .put_template(&ProgramTemplate {
                id: template_id,
                owner_id: DeviceId::new(),
                name: "Legs".into(),
                day_of_week: None,
            })
            .await
            .unwrap();
        let exercise = TemplateExercise {
            id: ExerciseId::new(),
            template_id,
            order_index: 0,
            name: "Squat".into(),
            target_sets: 5,
            target_reps: 5,
            target_weight: 120.0,
        };
        store.put_template_exercise(&exercise).await.unwrap();

        store.delete_template(&template_id).await.unwrap();

        assert!(store.template(&template_id).await.unwrap().is_none());
        assert!(store
            .template_exercise(&exercise.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn outbox_preserves_enqueue_order() {
        let store = SqliteStore::in_memory().await.unwrap();

        let s1 = store
            .outbox_push(&SyncEvent::FetchProgram(FetchProgram {}), 1_000)
            .await
            .unwrap();
        let s2 = store
            .outbox_push(&SyncEvent::RequestSync(RequestSync {}), 2_000)
            .await
            .unwrap();

        assert!(s2 > s1);
        let items = store.outbox_items().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].seq, s1);
        assert_eq!(items[1].seq, s2);
        assert_eq!(store.outbox_len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn outbox_remove_and_mark_attempt() {
        let store = SqliteStore::in_memory().await.unwrap();

        let seq = store
            .outbox_push(&SyncEvent::FetchProgram(FetchProgram {}), 1_000)
            .await
            .unwrap();

        store.outbox_mark_attempt(seq, 5_000).await.unwrap();
        let items = store.outbox_items().await.unwrap();
        assert_eq!(items[0].last_attempt_at, Some(5_000));

        store.outbox_remove(seq).await.unwrap();
        assert_eq!(store.outbox_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn outbox_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store
                .outbox_push(&SyncEvent::FetchProgram(FetchProgram {}), 1_000)
                .await
                .unwrap();
            store.save().await.unwrap();
        }

        let reopened = SqliteStore::open(&path).await.unwrap();
        let items = reopened.outbox_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0].event, SyncEvent::FetchProgram(_)));
    }
}
