//! Session resume-point reconstruction.
//!
//! A workout must survive app kill, device reboot, or prolonged
//! unreachability. Rather than checkpointing "where the user is" as
//! mutable state, the resume point is recomputed on every cold start and
//! view re-entry by replaying the append-only set log against the
//! session's ordered exercise plan. No network access, no in-memory
//! state.

use repsync_types::{ExerciseLogEntry, ExercisePlan};

/// Where the user should continue their workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    /// Continue at this position.
    At {
        /// Index into the session's ordered exercise list.
        exercise_index: u32,
        /// Number of sets already completed for that exercise; the next
        /// set to perform is `set_index + 1` (1-based).
        set_index: u32,
    },
    /// Every planned set has been logged; the session is completable.
    ///
    /// Also returned when the log references an exercise index outside
    /// the plan - an ambiguous log is treated as a finished session and
    /// surfaced as a completion prompt, never as an error.
    Complete,
}

/// Derive the resume point for a session from its plan and log.
///
/// `entries` must be the session's full log in creation order (the store
/// returns it that way). The most recent entry gives the candidate
/// position: the exercise it was logged against and the number of sets
/// done there. When that exercise's target set count is reached, the
/// position advances to the next exercise; past the last exercise the
/// session counts as fully logged.
pub fn resume_point(plan: &[ExercisePlan], entries: &[ExerciseLogEntry]) -> ResumePoint {
    let Some(last) = entries.last() else {
        if plan.is_empty() {
            return ResumePoint::Complete;
        }
        return ResumePoint::At {
            exercise_index: 0,
            set_index: 0,
        };
    };

    let exercise_index = last.exercise_order_index;
    let Some(exercise) = plan.get(exercise_index as usize) else {
        return ResumePoint::Complete;
    };

    if last.set_number >= exercise.target_sets {
        let next = exercise_index + 1;
        if (next as usize) >= plan.len() {
            return ResumePoint::Complete;
        }
        return ResumePoint::At {
            exercise_index: next,
            set_index: 0,
        };
    }

    ResumePoint::At {
        exercise_index,
        set_index: last.set_number,
    }
}
