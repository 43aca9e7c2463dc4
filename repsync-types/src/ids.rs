//! Identity types for repsync.
//!
//! All identifiers are UUID v4 newtypes. Identity is assigned once by the
//! device that creates a record and is stable across devices; the merge
//! engine relies on this for idempotent upserts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Create an identifier from raw bytes (16 bytes).
            pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
                uuid::Uuid::from_slice(bytes).ok().map(Self)
            }

            /// Get the raw bytes of this identifier.
            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }

            /// Get the inner UUID.
            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// Whether this is the all-zero UUID (never produced by `new`).
            ///
            /// A nil identifier on an incoming record marks it malformed.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id! {
    /// A unique identifier for a workout session.
    SessionId
}

uuid_id! {
    /// A unique identifier for a single logged set.
    EntryId
}

uuid_id! {
    /// A unique identifier for a program template.
    TemplateId
}

uuid_id! {
    /// A unique identifier for a template exercise.
    ///
    /// Globally stable across devices; this is what makes the template
    /// merge idempotent.
    ExerciseId
}

uuid_id! {
    /// A unique identifier for a device.
    DeviceId
}
