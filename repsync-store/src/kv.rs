//! Flat key-value fallback backend.
//!
//! Used when the structured backend fails to initialize. The whole store
//! is one JSON object persisted to a single file; exact-key lookups are
//! the only primitive. List operations are prefix scans over the
//! in-memory map, so the reduced query expressiveness stays invisible to
//! callers. Every mutation rewrites the file (write-through), which is
//! acceptable at degraded-mode data volumes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use repsync_types::{
    EntryId, ExerciseId, ExerciseLogEntry, ExercisePlan, ProgramTemplate, SessionId, SyncEvent,
    TemplateExercise, TemplateId, WorkoutSession,
};

use crate::error::{StoreError, StoreResult};
use crate::{RecordStore, StoredOutboxItem};

/// Key-value file store.
pub struct KvStore {
    path: PathBuf,
    inner: Mutex<BTreeMap<String, Value>>,
}

#[derive(Serialize, Deserialize)]
struct OutboxRecord {
    event: SyncEvent,
    enqueued_at: i64,
    last_attempt_at: Option<i64>,
}

impl KvStore {
    /// Open (creating if missing) a key-value store at the given path.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let map = match tokio::fs::read_to_string(path).await {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(map),
        })
    }

    async fn persist(&self, map: &BTreeMap<String, Value>) -> StoreResult<()> {
        let contents = serde_json::to_vec_pretty(map)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn decode<T: for<'de> Deserialize<'de>>(key: &str, value: &Value) -> StoreResult<T> {
        serde_json::from_value(value.clone()).map_err(|_| StoreError::Corrupt {
            context: key.to_string(),
        })
    }

    fn next_counter(map: &mut BTreeMap<String, Value>, key: &str) -> u64 {
        let next = map
            .get(key)
            .and_then(Value::as_u64)
            .unwrap_or(0)
            .saturating_add(1);
        map.insert(key.to_string(), Value::from(next));
        next
    }
}

fn session_key(id: &SessionId) -> String {
    format!("session/{id}")
}

fn plan_prefix(id: &SessionId) -> String {
    format!("plan/{id}/")
}

fn log_prefix(id: &SessionId) -> String {
    format!("log/{id}/")
}

fn log_index_key(id: &EntryId) -> String {
    format!("logix/{id}")
}

fn template_key(id: &TemplateId) -> String {
    format!("template/{id}")
}

fn exercise_prefix(template_id: &TemplateId) -> String {
    format!("tex/{template_id}/")
}

fn exercise_index_key(id: &ExerciseId) -> String {
    format!("texix/{id}")
}

fn outbox_key(seq: u64) -> String {
    format!("outbox/{seq:020}")
}

fn scan<'a>(
    map: &'a BTreeMap<String, Value>,
    prefix: &'a str,
) -> impl Iterator<Item = (&'a String, &'a Value)> {
    map.range(prefix.to_string()..)
        .take_while(move |(k, _)| k.starts_with(prefix))
}

#[async_trait]
impl RecordStore for KvStore {
    async fn put_session(&self, session: &WorkoutSession) -> StoreResult<()> {
        let mut map = self.inner.lock().await;
        map.insert(session_key(&session.id), serde_json::to_value(session)?);
        self.persist(&map).await
    }

    async fn session(&self, id: &SessionId) -> StoreResult<Option<WorkoutSession>> {
        let map = self.inner.lock().await;
        let key = session_key(id);
        map.get(&key).map(|v| Self::decode(&key, v)).transpose()
    }

    async fn active_session(&self) -> StoreResult<Option<WorkoutSession>> {
        let map = self.inner.lock().await;
        let mut best: Option<WorkoutSession> = None;
        for (key, value) in scan(&map, "session/") {
            let session: WorkoutSession = Self::decode(key, value)?;
            if session.is_active()
                && best
                    .as_ref()
                    .map_or(true, |b| session.started_at > b.started_at)
            {
                best = Some(session);
            }
        }
        Ok(best)
    }

    async fn put_plan(&self, session_id: &SessionId, plan: &[ExercisePlan]) -> StoreResult<()> {
        let mut map = self.inner.lock().await;
        let prefix = plan_prefix(session_id);
        let stale: Vec<String> = scan(&map, &prefix).map(|(k, _)| k.clone()).collect();
        for key in stale {
            map.remove(&key);
        }
        for row in plan {
            map.insert(
                format!("{prefix}{:05}", row.order_index),
                serde_json::to_value(row)?,
            );
        }
        self.persist(&map).await
    }

    async fn plan(&self, session_id: &SessionId) -> StoreResult<Vec<ExercisePlan>> {
        let map = self.inner.lock().await;
        scan(&map, &plan_prefix(session_id))
            .map(|(k, v)| Self::decode(k, v))
            .collect()
    }

    async fn append_log_entry(&self, entry: &ExerciseLogEntry) -> StoreResult<bool> {
        let mut map = self.inner.lock().await;
        let index_key = log_index_key(&entry.id);
        if map.contains_key(&index_key) {
            return Ok(false);
        }

        let seq = Self::next_counter(&mut map, "meta/log_seq");
        let key = format!("{}{seq:020}", log_prefix(&entry.session_id));
        map.insert(key.clone(), serde_json::to_value(entry)?);
        map.insert(index_key, Value::from(key));
        self.persist(&map).await?;
        Ok(true)
    }

    async fn log_entries(&self, session_id: &SessionId) -> StoreResult<Vec<ExerciseLogEntry>> {
        let map = self.inner.lock().await;
        let mut entries: Vec<ExerciseLogEntry> = scan(&map, &log_prefix(session_id))
            .map(|(k, v)| Self::decode(k, v))
            .collect::<StoreResult<_>>()?;
        // Keys iterate in insertion order; a stable sort by timestamp
        // keeps that order for ties.
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn put_template(&self, template: &ProgramTemplate) -> StoreResult<()> {
        let mut map = self.inner.lock().await;
        map.insert(template_key(&template.id), serde_json::to_value(template)?);
        self.persist(&map).await
    }

    async fn template(&self, id: &TemplateId) -> StoreResult<Option<ProgramTemplate>> {
        let map = self.inner.lock().await;
        let key = template_key(id);
        map.get(&key).map(|v| Self::decode(&key, v)).transpose()
    }

    async fn templates(&self) -> StoreResult<Vec<ProgramTemplate>> {
        let map = self.inner.lock().await;
        let mut templates: Vec<ProgramTemplate> = scan(&map, "template/")
            .map(|(k, v)| Self::decode(k, v))
            .collect::<StoreResult<_>>()?;
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    async fn delete_template(&self, id: &TemplateId) -> StoreResult<()> {
        let mut map = self.inner.lock().await;
        map.remove(&template_key(id));

        let doomed: Vec<String> = scan(&map, &exercise_prefix(id))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            if let Some(value) = map.remove(&key) {
                if let Ok(exercise) = Self::decode::<TemplateExercise>(&key, &value) {
                    map.remove(&exercise_index_key(&exercise.id));
                }
            }
        }
        self.persist(&map).await
    }

    async fn put_template_exercise(&self, exercise: &TemplateExercise) -> StoreResult<()> {
        let mut map = self.inner.lock().await;
        let index_key = exercise_index_key(&exercise.id);

        // If the exercise moved to another template, drop the old row.
        let old_key = map
            .get(&index_key)
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(old_key) = old_key {
            map.remove(&old_key);
        }

        let key = format!("{}{}", exercise_prefix(&exercise.template_id), exercise.id);
        map.insert(key.clone(), serde_json::to_value(exercise)?);
        map.insert(index_key, Value::from(key));
        self.persist(&map).await
    }

    async fn template_exercise(&self, id: &ExerciseId) -> StoreResult<Option<TemplateExercise>> {
        let map = self.inner.lock().await;
        let Some(key) = map.get(&exercise_index_key(id)).and_then(Value::as_str) else {
            return Ok(None);
        };
        map.get(key).map(|v| Self::decode(key, v)).transpose()
    }

    async fn template_exercises(
        &self,
        template_id: &TemplateId,
    ) -> StoreResult<Vec<TemplateExercise>> {
        let map = self.inner.lock().await;
        let mut exercises: Vec<TemplateExercise> = scan(&map, &exercise_prefix(template_id))
            .map(|(k, v)| Self::decode(k, v))
            .collect::<StoreResult<_>>()?;
        exercises.sort_by_key(|e| e.order_index);
        Ok(exercises)
    }

    async fn delete_template_exercise(&self, id: &ExerciseId) -> StoreResult<()> {
        let mut map = self.inner.lock().await;
        if let Some(key) = map.remove(&exercise_index_key(id)) {
            if let Some(key) = key.as_str() {
                map.remove(key);
            }
        }
        self.persist(&map).await
    }

    async fn outbox_push(&self, event: &SyncEvent, enqueued_at: i64) -> StoreResult<u64> {
        let mut map = self.inner.lock().await;
        let seq = Self::next_counter(&mut map, "meta/outbox_seq");
        let record = OutboxRecord {
            event: event.clone(),
            enqueued_at,
            last_attempt_at: None,
        };
        map.insert(outbox_key(seq), serde_json::to_value(&record)?);
        self.persist(&map).await?;
        Ok(seq)
    }

    async fn outbox_items(&self) -> StoreResult<Vec<StoredOutboxItem>> {
        let map = self.inner.lock().await;
        scan(&map, "outbox/")
            .map(|(key, value)| {
                let seq: u64 = key
                    .rsplit('/')
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| StoreError::Corrupt {
                        context: key.clone(),
                    })?;
                let record: OutboxRecord = Self::decode(key, value)?;
                Ok(StoredOutboxItem {
                    seq,
                    event: record.event,
                    enqueued_at: record.enqueued_at,
                    last_attempt_at: record.last_attempt_at,
                })
            })
            .collect()
    }

    async fn outbox_remove(&self, seq: u64) -> StoreResult<()> {
        let mut map = self.inner.lock().await;
        map.remove(&outbox_key(seq));
        self.persist(&map).await
    }

    async fn outbox_mark_attempt(&self, seq: u64, attempted_at: i64) -> StoreResult<()> {
        let mut map = self.inner.lock().await;
        let key = outbox_key(seq);
        if let Some(value) = map.get(&key) {
            let mut record: OutboxRecord = Self::decode(&key, value)?;
            record.last_attempt_at = Some(attempted_at);
            map.insert(key, serde_json::to_value(&record)?);
        }
        self.persist(&map).await
    }

    async fn outbox_len(&self) -> StoreResult<usize> {
        let map = self.inner.lock().await;
        Ok(scan(&map, "outbox/").count())
    }

    async fn save(&self) -> StoreResult<()> {
        let map = self.inner.lock().await;
        self.persist(&map).await
    }
}
