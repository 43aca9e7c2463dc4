//! Mock transport for testing.
//!
//! Allows scripting reachability, forcing failures, queueing inbound
//! events, and capturing everything the engine sends.

use super::{ActivationState, DeliveryAck, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use repsync_types::SyncEvent;

/// Mock transport for testing.
#[derive(Debug)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
    reachable_tx: Arc<watch::Sender<bool>>,
}

#[derive(Debug)]
struct MockInner {
    activation: ActivationState,
    sent_immediate: Vec<SyncEvent>,
    sent_deferred: Vec<SyncEvent>,
    inbound: VecDeque<SyncEvent>,
    fail_next_activate: Option<String>,
    fail_next_sends: u32,
    ack_counter: i64,
}

impl Default for MockTransport {
    fn default() -> Self {
        let (reachable_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Mutex::new(MockInner {
                activation: ActivationState::Inactive,
                sent_immediate: Vec::new(),
                sent_deferred: Vec::new(),
                inbound: VecDeque::new(),
                fail_next_activate: None,
                fail_next_sends: 0,
                ack_counter: 0,
            })),
            reachable_tx: Arc::new(reachable_tx),
        }
    }
}

impl MockTransport {
    /// Create a new mock transport, unactivated and unreachable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the simulated reachability of the peer.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable_tx.send_replace(reachable);
    }

    /// Queue an event to be returned by the next `recv()` call.
    pub fn queue_incoming(&self, event: SyncEvent) {
        let mut inner = self.inner.lock().unwrap();
        inner.inbound.push_back(event);
    }

    /// Every event delivered through `send_immediate`, in order.
    pub fn sent_immediate(&self) -> Vec<SyncEvent> {
        let inner = self.inner.lock().unwrap();
        inner.sent_immediate.clone()
    }

    /// Every event handed to `send_deferred`, in order.
    pub fn sent_deferred(&self) -> Vec<SyncEvent> {
        let inner = self.inner.lock().unwrap();
        inner.sent_deferred.clone()
    }

    /// Cause the next activation to fail with the given error.
    pub fn fail_next_activate(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_activate = Some(error.to_string());
    }

    /// Cause the next `n` immediate sends to fail.
    pub fn fail_next_sends(&self, n: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_sends = n;
    }

    /// Clear captured traffic (keeps activation and reachability).
    pub fn reset_captures(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.sent_immediate.clear();
        inner.sent_deferred.clear();
        inner.inbound.clear();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            reachable_tx: Arc::clone(&self.reachable_tx),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn activate(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_activate.take() {
            inner.activation = ActivationState::Failed;
            return Err(TransportError::ActivationFailed(error));
        }

        inner.activation = ActivationState::Active;
        Ok(())
    }

    fn activation_state(&self) -> ActivationState {
        let inner = self.inner.lock().unwrap();
        inner.activation
    }

    fn is_reachable(&self) -> bool {
        *self.reachable_tx.borrow()
    }

    fn reachability_changes(&self) -> watch::Receiver<bool> {
        self.reachable_tx.subscribe()
    }

    async fn send_immediate(&self, event: SyncEvent) -> Result<DeliveryAck, TransportError> {
        if !self.is_reachable() {
            return Err(TransportError::NotReachable);
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.activation != ActivationState::Active {
            return Err(TransportError::NotActivated);
        }
        if inner.fail_next_sends > 0 {
            inner.fail_next_sends -= 1;
            return Err(TransportError::SendFailed("scripted failure".into()));
        }

        inner.sent_immediate.push(event);
        inner.ack_counter += 1;
        Ok(DeliveryAck {
            received_at: inner.ack_counter,
        })
    }

    fn send_deferred(&self, event: SyncEvent) {
        let mut inner = self.inner.lock().unwrap();
        inner.sent_deferred.push(event);
    }

    async fn recv(&self) -> Result<SyncEvent, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.inbound.pop_front().ok_or(TransportError::Closed)
    }
}
