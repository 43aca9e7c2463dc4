//! Inbound merge engine.
//!
//! Applies incoming records to the local store with idempotent
//! upsert-by-identity semantics. Partial and duplicate batches are
//! tolerated: a malformed record is skipped with a diagnostic and the
//! rest of the batch still applies.
//!
//! Both trigger paths converge here - the primary pushing a batch
//! directly, and the companion requesting a full resync - so repeated
//! application of the same catalog is always safe.

use std::sync::Arc;

use repsync_core::merge::{
    merge_session, merge_template, merge_template_exercise, validate_template,
    validate_template_exercise, validate_workout_start, validate_workout_update,
};
use repsync_store::{RecordStore, StoreResult};
use repsync_types::{
    ExerciseLogEntry, ExercisePlan, TemplateId, TemplateRecord, WorkoutStart, WorkoutUpdate,
};

/// Outcome of applying one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    /// Records written (inserted or updated).
    pub applied: usize,
    /// Malformed records skipped with a diagnostic.
    pub skipped: usize,
}

/// Applies incoming domain records to the durable record store.
pub struct MergeEngine {
    store: Arc<dyn RecordStore>,
}

impl MergeEngine {
    /// Create a merge engine over the given store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Apply a template catalog batch.
    ///
    /// Counts each template header and each exercise row as one record.
    /// One corrupt record never aborts the merge; it is skipped
    /// individually and the batch continues.
    pub async fn apply_template_batch(
        &self,
        templates: &[TemplateRecord],
    ) -> StoreResult<BatchReport> {
        let mut report = BatchReport::default();

        for record in templates {
            if let Err(err) = validate_template(record) {
                tracing::warn!(%err, "skipping malformed template record");
                report.skipped += 1;
                continue;
            }

            let existing = self.store.template(&record.template_id).await?;
            let (template, outcome) = merge_template(existing.as_ref(), record);
            self.store.put_template(&template).await?;
            tracing::debug!(template = %template.id, ?outcome, "template merged");
            report.applied += 1;

            for row in &record.exercises {
                if self
                    .apply_exercise_update(record.template_id, row)
                    .await?
                {
                    report.applied += 1;
                } else {
                    report.skipped += 1;
                }
            }
        }

        self.store.save().await?;
        Ok(report)
    }

    /// Upsert a single exercise row of a template.
    ///
    /// Returns whether the row was applied (false: skipped as
    /// malformed).
    pub async fn apply_exercise_update(
        &self,
        template_id: TemplateId,
        row: &ExercisePlan,
    ) -> StoreResult<bool> {
        if let Err(err) = validate_template_exercise(row) {
            tracing::warn!(%err, "skipping malformed exercise record");
            return Ok(false);
        }

        let existing = self.store.template_exercise(&row.exercise_id).await?;
        let (exercise, _outcome) = merge_template_exercise(existing.as_ref(), template_id, row);
        self.store.put_template_exercise(&exercise).await?;
        Ok(true)
    }

    /// Apply an incoming workout-start event.
    ///
    /// Insert-only: a session that already exists locally (active or
    /// completed) is left untouched. Returns whether a session was
    /// created.
    pub async fn apply_workout_start(&self, start: &WorkoutStart) -> StoreResult<bool> {
        if let Err(err) = validate_workout_start(start) {
            tracing::warn!(%err, "skipping malformed workout_start");
            return Ok(false);
        }

        let existing = self.store.session(&start.session_id).await?;
        let Some(session) = merge_session(existing.as_ref(), start) else {
            tracing::debug!(session = %start.session_id, "workout_start already known; no-op");
            return Ok(false);
        };

        self.store.put_session(&session).await?;
        self.store.put_plan(&session.id, &start.exercises).await?;
        self.store.save().await?;
        tracing::info!(session = %session.id, "workout session received from peer");
        Ok(true)
    }

    /// Apply an incoming set-log event.
    ///
    /// The log is append-only: entries insert by identity and are never
    /// overwritten, so redelivery is a no-op. Returns whether a new
    /// entry was inserted.
    pub async fn apply_workout_update(&self, update: &WorkoutUpdate) -> StoreResult<bool> {
        if let Err(err) = validate_workout_update(update) {
            tracing::warn!(%err, "skipping malformed workout_update");
            return Ok(false);
        }

        let entry = ExerciseLogEntry {
            id: update.entry_id,
            session_id: update.session_id,
            exercise_order_index: update.exercise_order_index,
            set_number: update.set_number,
            weight: update.weight,
            reps: update.reps,
            completed: true,
            created_at: update.logged_at,
        };

        let inserted = self.store.append_log_entry(&entry).await?;
        if inserted {
            self.store.save().await?;
            tracing::debug!(entry = %entry.id, session = %entry.session_id, "set log merged");
        }
        Ok(inserted)
    }
}
