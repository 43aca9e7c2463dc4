//! Transport abstraction for repsync.
//!
//! This module provides a pluggable transport layer that abstracts the
//! wrist/phone link (platform wireless session, loopback pair, mock for
//! testing).
//!
//! # Design
//!
//! Two delivery primitives with very different guarantees:
//! - `send_immediate()` requires live reachability and fails fast
//!   (bounded time) instead of hanging when the peer does not answer
//! - `send_deferred()` is fire-and-forget: accepted unconditionally,
//!   delivered whenever the peer next becomes reachable, no ordering
//!   guarantee
//!
//! The engine always prefers `send_immediate` and falls back to the
//! durable outbox; `send_deferred` is reserved for the program-catalog
//! exchange where redelivery is harmless.

mod loopback;
mod mock;

pub use loopback::LoopbackTransport;
pub use mock::MockTransport;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use repsync_types::SyncEvent;

/// Transport errors.
///
/// Never fatal to the engine: a failed send downgrades to "stay pending
/// in the outbox".
#[derive(Debug, Error)]
pub enum TransportError {
    /// Session has not been activated yet.
    #[error("session not activated")]
    NotActivated,

    /// Session activation failed.
    #[error("activation failed: {0}")]
    ActivationFailed(String),

    /// Peer is not currently connectable.
    #[error("peer not reachable")]
    NotReachable,

    /// Send failed after the peer was contacted.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The peer did not acknowledge within the bounded time.
    #[error("send timed out")]
    Timeout,

    /// The link is gone (peer endpoint dropped).
    #[error("link closed")]
    Closed,
}

/// Lifecycle of the transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    /// Not yet activated.
    Inactive,
    /// Activation in progress.
    Activating,
    /// Activated and usable.
    Active,
    /// Activation failed.
    Failed,
}

/// Acknowledgment of an immediate delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryAck {
    /// When the peer acknowledged receipt (unix ms).
    pub received_at: i64,
}

/// Transport trait for the device-to-device link.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Activate the session. Must be called before sending.
    async fn activate(&self) -> Result<(), TransportError>;

    /// Current session lifecycle state.
    fn activation_state(&self) -> ActivationState;

    /// Whether the peer is currently connectable.
    fn is_reachable(&self) -> bool;

    /// Subscribe to reachability changes.
    ///
    /// The receiver yields the current value plus every change; the
    /// reachability monitor turns these into single-fire online edges.
    fn reachability_changes(&self) -> watch::Receiver<bool>;

    /// Deliver an event now, or fail fast.
    ///
    /// Only usable while the peer is reachable. Implementations must
    /// return within a bounded time rather than hang; the engine
    /// additionally wraps calls in its own timeout.
    async fn send_immediate(&self, event: SyncEvent) -> Result<DeliveryAck, TransportError>;

    /// Hand an event to the store-and-forward channel.
    ///
    /// Accepted unconditionally, delivered whenever the peer process
    /// next wakes. No acknowledgment, no delivery-time bound, no
    /// ordering relative to other deferred sends.
    fn send_deferred(&self, event: SyncEvent);

    /// Receive the next inbound event.
    async fn recv(&self) -> Result<SyncEvent, TransportError>;
}
