//! # repsync-types
//!
//! Wire format and domain record types for the repsync cross-device
//! workout sync engine.
//!
//! This crate provides the foundational types used across all repsync
//! crates:
//! - [`SessionId`], [`EntryId`], [`TemplateId`], [`ExerciseId`],
//!   [`DeviceId`] - Identity types
//! - [`WorkoutSession`], [`ExerciseLogEntry`], [`ProgramTemplate`],
//!   [`TemplateExercise`], [`ExercisePlan`] - Domain records
//! - [`SyncEvent`] - Event payloads exchanged between devices
//! - [`WireError`] - Serialization error type

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod ids;
mod records;

pub use error::WireError;
pub use events::{
    FetchProgram, ProgramSync, RequestSync, SyncEvent, TemplateRecord, WorkoutStart, WorkoutUpdate,
};
pub use ids::{DeviceId, EntryId, ExerciseId, SessionId, TemplateId};
pub use records::{
    DeviceRole, ExerciseLogEntry, ExercisePlan, ProgramTemplate, SessionStatus, TemplateExercise,
    WorkoutSession,
};
