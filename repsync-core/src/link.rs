//! Link lifecycle state machine.
//!
//! This module provides a pure, side-effect-free state machine for the
//! transport session's lifecycle: activation and reachability. The state
//! machine takes events as input and produces a new state plus a list of
//! actions to execute.
//!
//! The actual I/O (activating the session, flushing the outbox) is
//! performed by repsync-engine, not by this module. This keeps the
//! single-fire "became reachable" semantics instantly testable without a
//! real wireless link.

/// Link state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Session not yet activated.
    Inactive,
    /// Activation in progress.
    Activating,
    /// Session activated; the peer may or may not be reachable.
    Active {
        /// Whether the peer is currently connectable.
        reachable: bool,
    },
    /// Activation failed; the link is unusable until retried.
    Failed,
}

impl LinkState {
    /// Create a new state machine in the Inactive state.
    pub fn new() -> Self {
        Self::Inactive
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller
    /// (repsync-engine) is responsible for executing the returned
    /// actions.
    pub fn on_event(self, event: LinkEvent) -> (Self, Vec<LinkAction>) {
        match (self, event) {
            // From Inactive (or after a failure, on retry)
            (Self::Inactive, LinkEvent::ActivateRequested)
            | (Self::Failed, LinkEvent::ActivateRequested) => {
                (Self::Activating, vec![LinkAction::BeginActivation])
            }

            // From Activating
            (Self::Activating, LinkEvent::ActivationSucceeded { reachable }) => {
                let actions = if reachable {
                    vec![LinkAction::FlushOutbox]
                } else {
                    vec![]
                };
                (Self::Active { reachable }, actions)
            }
            (Self::Activating, LinkEvent::ActivationFailed { .. }) => (Self::Failed, vec![]),

            // Reachability transitions: flush fires once per
            // offline→online edge, not on every path detail change.
            (Self::Active { reachable: false }, LinkEvent::ReachabilityChanged { reachable: true }) => {
                (Self::Active { reachable: true }, vec![LinkAction::FlushOutbox])
            }
            (Self::Active { .. }, LinkEvent::ReachabilityChanged { reachable }) => {
                (Self::Active { reachable }, vec![])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Whether the session is activated.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Whether the peer is currently connectable.
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Active { reachable: true })
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the link lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The application requested session activation.
    ActivateRequested,
    /// The transport reported successful activation.
    ActivationSucceeded {
        /// Whether the peer was reachable at activation time.
        reachable: bool,
    },
    /// The transport reported failed activation.
    ActivationFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The connectivity path changed.
    ReachabilityChanged {
        /// New reachability of the peer.
        reachable: bool,
    },
}

/// Actions to be executed by repsync-engine.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Start transport activation.
    BeginActivation,
    /// Drain the offline outbound queue.
    FlushOutbox,
}
