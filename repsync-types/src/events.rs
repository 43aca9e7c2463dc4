//! Event payloads exchanged over the transport session.
//!
//! Two message families exist, with distinct directions and idempotence
//! rules:
//! - program propagation (primary → companion): [`ProgramSync`] pushes
//!   the template catalog, [`FetchProgram`] requests it
//! - live workout logging (companion → primary): [`WorkoutStart`],
//!   [`WorkoutUpdate`], with [`RequestSync`] asking the peer to resend
//!   the start record for the active session
//!
//! Events are structured records serialized as MessagePack on the wire.

use serde::{Deserialize, Serialize};

use crate::{DeviceId, EntryId, ExercisePlan, SessionId, TemplateId, WireError};

/// All events exchanged between the two devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A workout began; carries the full session plan.
    WorkoutStart(WorkoutStart),
    /// One set was logged.
    WorkoutUpdate(WorkoutUpdate),
    /// Push of the full template catalog.
    ProgramSync(ProgramSync),
    /// Request for the full template catalog.
    FetchProgram(FetchProgram),
    /// Request to resend `WorkoutStart` for the currently active session.
    RequestSync(RequestSync),
}

impl SyncEvent {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec(self).map_err(WireError::Encode)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(WireError::Decode)
    }

    /// Short name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::WorkoutStart(_) => "workout_start",
            SyncEvent::WorkoutUpdate(_) => "workout_update",
            SyncEvent::ProgramSync(_) => "program_sync",
            SyncEvent::FetchProgram(_) => "fetch_program",
            SyncEvent::RequestSync(_) => "request_sync",
        }
    }
}

/// A workout session began on the sending device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutStart {
    /// The new session's identifier.
    pub session_id: SessionId,
    /// Template the workout was started from, if any.
    pub template_id: Option<TemplateId>,
    /// When the workout began (unix ms).
    pub started_at: i64,
    /// The session's ordered exercise list.
    pub exercises: Vec<ExercisePlan>,
}

/// One set was completed on the sending device.
///
/// Carries the entry identity so that redelivery (flush retry, transport
/// duplication) merges idempotently on the receiving side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutUpdate {
    /// Identity of the log entry this event mirrors.
    pub entry_id: EntryId,
    /// The session being logged against.
    pub session_id: SessionId,
    /// Display name of the exercise.
    pub exercise_name: String,
    /// Position of the exercise within the session's ordered list.
    pub exercise_order_index: u32,
    /// Set number within the exercise, 1-based.
    pub set_number: u32,
    /// Repetitions performed.
    pub reps: u32,
    /// Weight used.
    pub weight: f64,
    /// When the set was logged (unix ms).
    pub logged_at: i64,
}

/// Full template catalog push (primary → companion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramSync {
    /// Every template the sender currently holds.
    pub templates: Vec<TemplateRecord>,
}

/// One template with its ordered exercise list, as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    /// Template identity.
    pub template_id: TemplateId,
    /// Owning device.
    pub owner_id: DeviceId,
    /// Display name.
    pub name: String,
    /// Scheduled day of week, 1 = Monday .. 7 = Sunday.
    pub day_of_week: Option<u8>,
    /// Ordered exercise list.
    pub exercises: Vec<ExercisePlan>,
}

/// Pull request for the full template catalog. No payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchProgram {}

/// Ask the peer to resend `WorkoutStart` for the active session.
///
/// Used when the companion has no local session record but the primary
/// believes one is active. No payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestSync {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> Vec<ExercisePlan> {
        vec![
            ExercisePlan {
                exercise_id: crate::ExerciseId::new(),
                name: "Squat".into(),
                order_index: 0,
                target_sets: 5,
                target_reps: 5,
                target_weight: 100.0,
            },
            ExercisePlan {
                exercise_id: crate::ExerciseId::new(),
                name: "Row".into(),
                order_index: 1,
                target_sets: 3,
                target_reps: 8,
                target_weight: 70.0,
            },
        ]
    }

    #[test]
    fn workout_start_roundtrip() {
        let event = SyncEvent::WorkoutStart(WorkoutStart {
            session_id: SessionId::new(),
            template_id: Some(TemplateId::new()),
            started_at: 1_700_000_000_000,
            exercises: sample_plan(),
        });

        let bytes = event.to_bytes().unwrap();
        let restored = SyncEvent::from_bytes(&bytes).unwrap();
        assert_eq!(event, restored);
    }

    #[test]
    fn workout_update_roundtrip() {
        let event = SyncEvent::WorkoutUpdate(WorkoutUpdate {
            entry_id: EntryId::new(),
            session_id: SessionId::new(),
            exercise_name: "Squat".into(),
            exercise_order_index: 0,
            set_number: 2,
            reps: 5,
            weight: 102.5,
            logged_at: 1_700_000_123_456,
        });

        let bytes = event.to_bytes().unwrap();
        let restored = SyncEvent::from_bytes(&bytes).unwrap();
        assert_eq!(event, restored);
    }

    #[test]
    fn empty_payload_events_roundtrip() {
        for event in [
            SyncEvent::FetchProgram(FetchProgram {}),
            SyncEvent::RequestSync(RequestSync {}),
        ] {
            let bytes = event.to_bytes().unwrap();
            assert_eq!(event, SyncEvent::from_bytes(&bytes).unwrap());
        }
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(SyncEvent::from_bytes(&[0xFF, 0x00, 0x13, 0x37]).is_err());
    }

    #[test]
    fn kind_names_are_stable() {
        let event = SyncEvent::FetchProgram(FetchProgram {});
        assert_eq!(event.kind(), "fetch_program");
    }
}
