//! Idempotent merge decisions for incoming records.
//!
//! The merge engine in repsync-engine looks records up in the store and
//! writes the results; the decisions themselves live here, pure and
//! instantly testable:
//! - validation (a malformed record is skipped individually, with a
//!   diagnostic; it never aborts its batch)
//! - last-writer-wins upsert for the template direction
//! - insert-only merge for the workout direction (a completed session is
//!   never reverted, log entries are never overwritten)
//!
//! Conflict resolution is last-writer-wins by arrival order, with no
//! version field: templates are edited by a single owning device, so
//! concurrent edits are not expected. If that assumption is ever
//! violated the later-arriving write silently wins.

use thiserror::Error;

use repsync_types::{
    ExercisePlan, ProgramTemplate, SessionStatus, TemplateExercise, TemplateId, TemplateRecord,
    WorkoutSession, WorkoutStart, WorkoutUpdate,
};

/// Why an incoming record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// The record carries no usable identity.
    #[error("{kind} record is missing its identity")]
    MissingIdentity {
        /// Record family, for diagnostics.
        kind: &'static str,
    },

    /// A required field is empty or absent.
    #[error("{kind} record is missing required field `{field}`")]
    MissingField {
        /// Record family, for diagnostics.
        kind: &'static str,
        /// Name of the offending field.
        field: &'static str,
    },

    /// A field value is outside its valid range.
    #[error("{kind} record has invalid `{field}`: {reason}")]
    InvalidField {
        /// Record family, for diagnostics.
        kind: &'static str,
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// What the upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No local record existed; the incoming one was inserted.
    Inserted,
    /// A local record existed; its mutable fields were overwritten.
    Updated,
}

/// Validate an incoming template record.
pub fn validate_template(record: &TemplateRecord) -> Result<(), MergeError> {
    if record.template_id.is_nil() {
        return Err(MergeError::MissingIdentity { kind: "template" });
    }
    if record.owner_id.is_nil() {
        return Err(MergeError::MissingField {
            kind: "template",
            field: "owner_id",
        });
    }
    if record.name.trim().is_empty() {
        return Err(MergeError::MissingField {
            kind: "template",
            field: "name",
        });
    }
    if let Some(day) = record.day_of_week {
        if !(1..=7).contains(&day) {
            return Err(MergeError::InvalidField {
                kind: "template",
                field: "day_of_week",
                reason: "must be 1..=7",
            });
        }
    }
    Ok(())
}

/// Validate one exercise row of an incoming template.
pub fn validate_template_exercise(row: &ExercisePlan) -> Result<(), MergeError> {
    if row.exercise_id.is_nil() {
        return Err(MergeError::MissingIdentity { kind: "exercise" });
    }
    if row.name.trim().is_empty() {
        return Err(MergeError::MissingField {
            kind: "exercise",
            field: "name",
        });
    }
    Ok(())
}

/// Validate an incoming workout-start event.
pub fn validate_workout_start(start: &WorkoutStart) -> Result<(), MergeError> {
    if start.session_id.is_nil() {
        return Err(MergeError::MissingIdentity {
            kind: "workout_start",
        });
    }
    Ok(())
}

/// Validate an incoming set-log event.
pub fn validate_workout_update(update: &WorkoutUpdate) -> Result<(), MergeError> {
    if update.entry_id.is_nil() {
        return Err(MergeError::MissingIdentity {
            kind: "workout_update",
        });
    }
    if update.session_id.is_nil() {
        return Err(MergeError::MissingField {
            kind: "workout_update",
            field: "session_id",
        });
    }
    if update.set_number == 0 {
        return Err(MergeError::InvalidField {
            kind: "workout_update",
            field: "set_number",
            reason: "set numbers are 1-based",
        });
    }
    Ok(())
}

/// Upsert decision for an incoming template header.
///
/// Returns the record to write. Applying the same record twice produces
/// the same result as applying it once.
pub fn merge_template(
    existing: Option<&ProgramTemplate>,
    incoming: &TemplateRecord,
) -> (ProgramTemplate, MergeOutcome) {
    let record = ProgramTemplate {
        id: incoming.template_id,
        owner_id: incoming.owner_id,
        name: incoming.name.clone(),
        day_of_week: incoming.day_of_week,
    };
    let outcome = if existing.is_some() {
        MergeOutcome::Updated
    } else {
        MergeOutcome::Inserted
    };
    (record, outcome)
}

/// Upsert decision for one exercise row of an incoming template.
pub fn merge_template_exercise(
    existing: Option<&TemplateExercise>,
    template_id: TemplateId,
    incoming: &ExercisePlan,
) -> (TemplateExercise, MergeOutcome) {
    let record = TemplateExercise {
        id: incoming.exercise_id,
        template_id,
        order_index: incoming.order_index,
        name: incoming.name.clone(),
        target_sets: incoming.target_sets,
        target_reps: incoming.target_reps,
        target_weight: incoming.target_weight,
    };
    let outcome = if existing.is_some() {
        MergeOutcome::Updated
    } else {
        MergeOutcome::Inserted
    };
    (record, outcome)
}

/// Merge decision for an incoming workout-start event.
///
/// The workout direction is insert-only: if the session is already known
/// locally - active or completed - the incoming start is a no-op. In
/// particular a completed session is never reverted to active.
pub fn merge_session(
    existing: Option<&WorkoutSession>,
    incoming: &WorkoutStart,
) -> Option<WorkoutSession> {
    match existing {
        Some(_) => None,
        None => Some(WorkoutSession {
            id: incoming.session_id,
            status: SessionStatus::Active,
            template_id: incoming.template_id,
            started_at: incoming.started_at,
            last_resumed_at: Some(incoming.started_at),
            active_duration_secs: 0,
        }),
    }
}
