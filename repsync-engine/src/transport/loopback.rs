//! In-process paired transport.
//!
//! `LoopbackTransport::pair()` returns two linked endpoints sharing one
//! simulated link. Immediate sends land in the peer's inbox while the
//! link is reachable; deferred sends park until the link next comes up.
//! Used by end-to-end tests and the CLI demo to run a primary and a
//! companion engine in one process without a real wireless link.

use super::{ActivationState, DeliveryAck, Transport, TransportError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

use repsync_types::SyncEvent;

/// Which end of the link this endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

#[derive(Debug)]
struct LoopbackLink {
    reachable: watch::Sender<bool>,
    to_a: mpsc::UnboundedSender<SyncEvent>,
    to_b: mpsc::UnboundedSender<SyncEvent>,
    deferred_to_a: Mutex<Vec<SyncEvent>>,
    deferred_to_b: Mutex<Vec<SyncEvent>>,
}

impl LoopbackLink {
    fn drain_deferred(&self) {
        for (queue, tx) in [
            (&self.deferred_to_a, &self.to_a),
            (&self.deferred_to_b, &self.to_b),
        ] {
            let parked: Vec<SyncEvent> = std::mem::take(&mut *queue.lock().unwrap());
            for event in parked {
                // Peer endpoint dropped: deferred delivery is
                // best-effort anyway.
                let _ = tx.send(event);
            }
        }
    }
}

/// One endpoint of an in-process link pair.
#[derive(Debug)]
pub struct LoopbackTransport {
    link: Arc<LoopbackLink>,
    side: Side,
    activation: Mutex<ActivationState>,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<SyncEvent>>,
}

impl LoopbackTransport {
    /// Create a linked pair of endpoints. The link starts unreachable.
    pub fn pair() -> (Self, Self) {
        let (to_a, rx_a) = mpsc::unbounded_channel();
        let (to_b, rx_b) = mpsc::unbounded_channel();
        let (reachable, _) = watch::channel(false);

        let link = Arc::new(LoopbackLink {
            reachable,
            to_a,
            to_b,
            deferred_to_a: Mutex::new(Vec::new()),
            deferred_to_b: Mutex::new(Vec::new()),
        });

        let a = Self {
            link: Arc::clone(&link),
            side: Side::A,
            activation: Mutex::new(ActivationState::Inactive),
            inbox: tokio::sync::Mutex::new(rx_a),
        };
        let b = Self {
            link,
            side: Side::B,
            activation: Mutex::new(ActivationState::Inactive),
            inbox: tokio::sync::Mutex::new(rx_b),
        };
        (a, b)
    }

    /// Flip the shared link. Bringing it up flushes parked deferred
    /// sends into the peers' inboxes.
    pub fn set_reachable(&self, reachable: bool) {
        self.link.reachable.send_replace(reachable);
        if reachable {
            self.link.drain_deferred();
        }
    }

    /// Try to receive without waiting (for test pumping).
    pub async fn try_recv(&self) -> Option<SyncEvent> {
        self.inbox.lock().await.try_recv().ok()
    }

    fn peer_tx(&self) -> &mpsc::UnboundedSender<SyncEvent> {
        match self.side {
            Side::A => &self.link.to_b,
            Side::B => &self.link.to_a,
        }
    }

    fn deferred_to_peer(&self) -> &Mutex<Vec<SyncEvent>> {
        match self.side {
            Side::A => &self.link.deferred_to_b,
            Side::B => &self.link.deferred_to_a,
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn activate(&self) -> Result<(), TransportError> {
        let mut activation = self.activation.lock().unwrap();
        *activation = ActivationState::Active;
        Ok(())
    }

    fn activation_state(&self) -> ActivationState {
        *self.activation.lock().unwrap()
    }

    fn is_reachable(&self) -> bool {
        *self.link.reachable.borrow()
    }

    fn reachability_changes(&self) -> watch::Receiver<bool> {
        self.link.reachable.subscribe()
    }

    async fn send_immediate(&self, event: SyncEvent) -> Result<DeliveryAck, TransportError> {
        if self.activation_state() != ActivationState::Active {
            return Err(TransportError::NotActivated);
        }
        if !self.is_reachable() {
            return Err(TransportError::NotReachable);
        }

        self.peer_tx()
            .send(event)
            .map_err(|_| TransportError::Closed)?;
        Ok(DeliveryAck {
            received_at: now_ms(),
        })
    }

    fn send_deferred(&self, event: SyncEvent) {
        if self.is_reachable() {
            let _ = self.peer_tx().send(event);
        } else {
            self.deferred_to_peer().lock().unwrap().push(event);
        }
    }

    async fn recv(&self) -> Result<SyncEvent, TransportError> {
        self.inbox
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
