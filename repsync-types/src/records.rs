//! Domain records for repsync.
//!
//! These are the persistent records held in each device's local store.
//! Ownership is per-device: the primary device owns program templates,
//! the device that started a workout owns its session and log entries.
//! Timestamps are unix milliseconds.

use serde::{Deserialize, Serialize};

use crate::{DeviceId, EntryId, ExerciseId, SessionId, TemplateId};

/// Which side of the link a device plays.
///
/// The roles differ only in protocol convention: the primary is the
/// source of truth for program templates, the companion for live
/// set-logging during a workout. Modelled explicitly so the two event
/// directions cannot accidentally overwrite each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    /// Owns program templates and long-term history.
    Primary,
    /// Performs workouts and owns live set logs.
    Companion,
}

/// Lifecycle status of a workout session.
///
/// Transitions are monotone: `Active` → `Completed` exactly once. A
/// completed session is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Workout in progress (possibly suspended, resumable).
    Active,
    /// Workout finished; no further writes allowed.
    Completed,
}

/// A single workout performed (or being performed) by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// The template this workout was started from, if any.
    pub template_id: Option<TemplateId>,
    /// When the workout began (unix ms).
    pub started_at: i64,
    /// When the workout was last resumed (unix ms).
    pub last_resumed_at: Option<i64>,
    /// Accumulated active time in seconds, across suspensions.
    pub active_duration_secs: u64,
}

impl WorkoutSession {
    /// Create a new active session starting now.
    pub fn start(template_id: Option<TemplateId>, started_at: i64) -> Self {
        Self {
            id: SessionId::new(),
            status: SessionStatus::Active,
            template_id,
            started_at,
            last_resumed_at: Some(started_at),
            active_duration_secs: 0,
        }
    }

    /// Whether the session can still accept log entries.
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// One completed set, recorded at the moment the user logged it.
///
/// Append-only: entries are inserted, never mutated or deleted.
/// Corrections are modelled as new entries. The set of entries for a
/// session, ordered by creation time, is the session's replayable truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseLogEntry {
    /// Unique entry identifier (assigned by the logging device).
    pub id: EntryId,
    /// The session this entry belongs to.
    pub session_id: SessionId,
    /// Position of the exercise within the session's ordered list.
    pub exercise_order_index: u32,
    /// Set number within the exercise, 1-based.
    pub set_number: u32,
    /// Weight used.
    pub weight: f64,
    /// Repetitions performed.
    pub reps: u32,
    /// Whether the set was completed as prescribed.
    pub completed: bool,
    /// When the entry was created (unix ms).
    pub created_at: i64,
}

/// A workout program template, owned by the primary device.
///
/// Propagated to the companion as a read-mostly cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramTemplate {
    /// Unique template identifier.
    pub id: TemplateId,
    /// Device that owns (edits) this template.
    pub owner_id: DeviceId,
    /// Display name.
    pub name: String,
    /// Scheduled day of week, 1 = Monday .. 7 = Sunday.
    pub day_of_week: Option<u8>,
}

/// One exercise within a program template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExercise {
    /// Unique exercise identifier, stable across devices.
    pub id: ExerciseId,
    /// The template this exercise belongs to.
    pub template_id: TemplateId,
    /// Position within the template's ordered exercise list.
    pub order_index: u32,
    /// Display name.
    pub name: String,
    /// Prescribed number of sets.
    pub target_sets: u32,
    /// Prescribed repetitions per set.
    pub target_reps: u32,
    /// Prescribed weight.
    pub target_weight: f64,
}

/// The ordered exercise list a session was started with.
///
/// Captured at workout start (from the template, or ad hoc) and persisted
/// with the session, so the resume point can be reconstructed without the
/// template still being present locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExercisePlan {
    /// The exercise this plan row was derived from.
    pub exercise_id: ExerciseId,
    /// Display name.
    pub name: String,
    /// Position within the session's ordered exercise list.
    pub order_index: u32,
    /// Prescribed number of sets.
    pub target_sets: u32,
    /// Prescribed repetitions per set.
    pub target_reps: u32,
    /// Prescribed weight.
    pub target_weight: f64,
}

impl ExercisePlan {
    /// Derive a plan row from a template exercise.
    pub fn from_template_exercise(ex: &TemplateExercise) -> Self {
        Self {
            exercise_id: ex.id,
            name: ex.name.clone(),
            order_index: ex.order_index,
            target_sets: ex.target_sets,
            target_reps: ex.target_reps,
            target_weight: ex.target_weight,
        }
    }
}
