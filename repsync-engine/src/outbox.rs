//! Durable offline outbound queue.
//!
//! Every outbound event that could not be delivered immediately lands
//! here. Items are persisted through the record store before the call
//! returns (they survive a process restart) and mirrored into the pure
//! [`OutboxQueue`] model for ordering and in-flight bookkeeping.
//!
//! Removal is gated on a positive delivery acknowledgment; a best-effort
//! send attempt alone never removes an item. There is no retry cap and
//! no backoff: workout data has no natural expiry, so items are
//! reattempted on every flush trigger until delivered or the user clears
//! local state.

use std::sync::Arc;
use std::time::Duration;

use repsync_core::{OutboxQueue, QueuedEvent};
use repsync_store::{RecordStore, StoreResult};
use repsync_types::SyncEvent;

use crate::transport::Transport;

/// Result of one flush pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    /// Whether this call performed the drain (false: another flush was
    /// already running and this call was a no-op).
    pub ran: bool,
    /// Items removed after positive acknowledgment.
    pub delivered: usize,
    /// Items that stay pending for the next trigger.
    pub failed: usize,
}

/// Queue depth and retry status, for the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    /// Events awaiting delivery.
    pub pending: usize,
    /// When delivery was last attempted, if ever (unix ms).
    pub last_attempt_at: Option<i64>,
}

/// The offline outbound queue.
pub struct Outbox {
    store: Arc<dyn RecordStore>,
    queue: tokio::sync::Mutex<OutboxQueue>,
    flush_gate: tokio::sync::Mutex<()>,
}

impl Outbox {
    /// Open the outbox, reloading any events persisted by an earlier
    /// process.
    pub async fn open(store: Arc<dyn RecordStore>) -> StoreResult<Self> {
        let mut queue = OutboxQueue::new();
        for item in store.outbox_items().await? {
            queue.insert(QueuedEvent {
                seq: item.seq,
                event: item.event,
                enqueued_at: item.enqueued_at,
                last_attempt_at: item.last_attempt_at,
            });
        }

        if !queue.is_empty() {
            tracing::info!(pending = queue.len(), "reloaded persisted outbox");
        }

        Ok(Self {
            store,
            queue: tokio::sync::Mutex::new(queue),
            flush_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Append an event to the queue.
    ///
    /// Persists before returning and never blocks on network state.
    pub async fn enqueue(&self, event: SyncEvent) -> StoreResult<u64> {
        let enqueued_at = now_ms();
        let seq = self.store.outbox_push(&event, enqueued_at).await?;
        self.store.save().await?;

        let mut queue = self.queue.lock().await;
        queue.insert(QueuedEvent {
            seq,
            event,
            enqueued_at,
            last_attempt_at: None,
        });
        tracing::debug!(seq, pending = queue.len(), "event queued for later delivery");
        Ok(seq)
    }

    /// Drain the queue through the immediate channel.
    ///
    /// Non-reentrant: while a flush is running, a concurrent call
    /// returns immediately with `ran = false`. Items are attempted in
    /// enqueue order; a failed item stays in place and the pass moves on
    /// to the next one, so one bad item never stalls the batch.
    pub async fn flush<T: Transport + ?Sized>(
        &self,
        transport: &T,
        send_timeout: Duration,
    ) -> FlushReport {
        let Ok(_guard) = self.flush_gate.try_lock() else {
            tracing::debug!("flush already running; skipping");
            return FlushReport::default();
        };

        let mut report = FlushReport {
            ran: true,
            ..Default::default()
        };

        let seqs = self.queue.lock().await.pending_seqs();
        for seq in seqs {
            if !transport.is_reachable() {
                // Link dropped mid-drain; everything left stays pending.
                break;
            }

            let Some(item) = self.queue.lock().await.begin(seq) else {
                continue;
            };

            let attempt =
                tokio::time::timeout(send_timeout, transport.send_immediate(item.event)).await;
            match attempt {
                Ok(Ok(_ack)) => {
                    if let Err(err) = self.store.outbox_remove(seq).await {
                        // The send went through; a failed removal only
                        // means a redundant (idempotent) redelivery
                        // later.
                        tracing::warn!(seq, %err, "failed to remove delivered outbox item");
                    }
                    self.queue.lock().await.complete(seq);
                    report.delivered += 1;
                }
                Ok(Err(err)) => {
                    self.record_failed_attempt(seq, &mut report).await;
                    tracing::debug!(seq, %err, "outbox delivery failed; staying pending");
                }
                Err(_elapsed) => {
                    self.record_failed_attempt(seq, &mut report).await;
                    tracing::debug!(seq, "outbox delivery timed out; staying pending");
                }
            }
        }

        if report.delivered > 0 || report.failed > 0 {
            tracing::info!(
                delivered = report.delivered,
                failed = report.failed,
                "outbox flush finished"
            );
        }
        report
    }

    async fn record_failed_attempt(&self, seq: u64, report: &mut FlushReport) {
        let attempted_at = now_ms();
        if let Err(err) = self.store.outbox_mark_attempt(seq, attempted_at).await {
            tracing::warn!(seq, %err, "failed to record outbox attempt");
        }
        self.queue.lock().await.abort(seq, Some(attempted_at));
        report.failed += 1;
    }

    /// Current queue depth and last attempt timestamp.
    pub async fn status(&self) -> QueueStatus {
        let queue = self.queue.lock().await;
        QueueStatus {
            pending: queue.len(),
            last_attempt_at: queue.last_attempt_at(),
        }
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use repsync_store::SqliteStore;
    use repsync_types::{FetchProgram, RequestSync};

    const TIMEOUT: Duration = Duration::from_millis(200);

    async fn open_outbox() -> Outbox {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        Outbox::open(store).await.unwrap()
    }

    async fn ready_transport() -> MockTransport {
        let transport = MockTransport::new();
        transport.activate().await.unwrap();
        transport.set_reachable(true);
        transport
    }

    fn ping() -> SyncEvent {
        SyncEvent::FetchProgram(FetchProgram {})
    }

    #[tokio::test]
    async fn enqueue_never_requires_reachability() {
        let outbox = open_outbox().await;
        outbox.enqueue(ping()).await.unwrap();
        assert_eq!(outbox.status().await.pending, 1);
    }

    #[tokio::test]
    async fn flush_delivers_in_enqueue_order() {
        let outbox = open_outbox().await;
        let transport = ready_transport().await;

        outbox.enqueue(ping()).await.unwrap();
        outbox
            .enqueue(SyncEvent::RequestSync(RequestSync {}))
            .await
            .unwrap();

        let report = outbox.flush(&transport, TIMEOUT).await;
        assert!(report.ran);
        assert_eq!(report.delivered, 2);
        assert_eq!(outbox.status().await.pending, 0);

        let sent = transport.sent_immediate();
        assert!(matches!(sent[0], SyncEvent::FetchProgram(_)));
        assert!(matches!(sent[1], SyncEvent::RequestSync(_)));
    }

    #[tokio::test]
    async fn failed_item_stays_and_batch_continues() {
        let outbox = open_outbox().await;
        let transport = ready_transport().await;

        outbox.enqueue(ping()).await.unwrap();
        outbox
            .enqueue(SyncEvent::RequestSync(RequestSync {}))
            .await
            .unwrap();

        // First send fails; the pass must still deliver the second item.
        transport.fail_next_sends(1);
        let report = outbox.flush(&transport, TIMEOUT).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);

        let status = outbox.status().await;
        assert_eq!(status.pending, 1);
        assert!(status.last_attempt_at.is_some());

        // The survivor is retried on the next trigger.
        let report = outbox.flush(&transport, TIMEOUT).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(outbox.status().await.pending, 0);
    }

    #[tokio::test]
    async fn flush_while_unreachable_leaves_everything_pending() {
        let outbox = open_outbox().await;
        let transport = MockTransport::new();
        transport.activate().await.unwrap();

        outbox.enqueue(ping()).await.unwrap();
        let report = outbox.flush(&transport, TIMEOUT).await;

        assert!(report.ran);
        assert_eq!(report.delivered, 0);
        assert_eq!(outbox.status().await.pending, 1);
    }

    #[tokio::test]
    async fn concurrent_flush_is_a_no_op() {
        let outbox = Arc::new(open_outbox().await);
        let transport = Arc::new(ready_transport().await);

        for _ in 0..3 {
            outbox.enqueue(ping()).await.unwrap();
        }

        let (r1, r2) = tokio::join!(
            outbox.flush(transport.as_ref(), TIMEOUT),
            outbox.flush(transport.as_ref(), TIMEOUT),
        );

        // Exactly one call performed the drain; nothing was sent twice.
        assert!(r1.ran ^ r2.ran || (r1.ran && r2.ran && (r1.delivered == 0 || r2.delivered == 0)));
        assert_eq!(r1.delivered + r2.delivered, 3);
        assert_eq!(transport.sent_immediate().len(), 3);
        assert_eq!(outbox.status().await.pending, 0);
    }

    #[tokio::test]
    async fn queue_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.db");

        {
            let store = Arc::new(SqliteStore::open(&path).await.unwrap());
            let outbox = Outbox::open(store).await.unwrap();
            outbox.enqueue(ping()).await.unwrap();
        }

        // Simulated process restart: a fresh store and outbox.
        let store = Arc::new(SqliteStore::open(&path).await.unwrap());
        let outbox = Outbox::open(store).await.unwrap();
        assert_eq!(outbox.status().await.pending, 1);

        let transport = ready_transport().await;
        let report = outbox.flush(&transport, TIMEOUT).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(outbox.status().await.pending, 0);
    }

    #[tokio::test]
    async fn flush_on_empty_queue_is_quiet() {
        let outbox = open_outbox().await;
        let transport = ready_transport().await;

        let report = outbox.flush(&transport, TIMEOUT).await;
        assert!(report.ran);
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 0);
    }
}
