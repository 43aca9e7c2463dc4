//! # repsync-engine
//!
//! Cross-device sync and offline-queueing engine for repsync.
//!
//! One engine runs per device over an injected [`Transport`] and
//! [`RecordStore`](repsync_store::RecordStore):
//!
//! ```text
//! workout UI ──► SyncEngine ──► Transport ──► peer device
//!                    │   ▲
//!                    ▼   │ reload on restart
//!              record store + outbox
//! ```
//!
//! - **Write-ahead**: every set is committed to the local store before
//!   any transport attempt
//! - **Immediate-first delivery**: `send_immediate` while reachable,
//!   durable [`Outbox`] otherwise; unbounded ack-gated retry
//! - **Idempotent merge**: incoming records upsert by stable identity,
//!   so duplicate and partial batches are safe
//! - **Deterministic resume**: "where was the user" is recomputed from
//!   the append-only log alone, never from in-memory state

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod merge;
pub mod outbox;
pub mod reachability;
pub mod transport;

pub use engine::{EngineConfig, EngineError, SyncEngine};
pub use merge::{BatchReport, MergeEngine};
pub use outbox::{FlushReport, Outbox, QueueStatus};
pub use reachability::ReachabilityMonitor;
pub use transport::{
    ActivationState, DeliveryAck, LoopbackTransport, MockTransport, Transport, TransportError,
};
