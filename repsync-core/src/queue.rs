//! In-memory model of the offline outbound queue.
//!
//! This module provides the ordering and in-flight bookkeeping for
//! not-yet-acknowledged outbound events:
//! - FIFO ordering by local sequence number (assigned at enqueue)
//! - In-flight tracking so an item is visible to exactly one send
//!   attempt at a time
//! - Removal strictly on positive acknowledgment
//!
//! Durability is not handled here: `repsync-engine` persists every item
//! through the record store and mirrors it into this model, so the queue
//! can be rebuilt after a process restart.

use std::collections::{BTreeMap, BTreeSet};

use repsync_types::SyncEvent;

/// A queued event waiting for delivery acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    /// Local, monotone sequence number; defines flush order.
    pub seq: u64,
    /// The event to deliver.
    pub event: SyncEvent,
    /// When the event was enqueued (unix ms).
    pub enqueued_at: i64,
    /// When delivery was last attempted, if ever (unix ms).
    pub last_attempt_at: Option<i64>,
}

/// Ordered queue of pending events with in-flight tracking.
///
/// Items flow through the queue in this order:
/// 1. `insert()` - add (at enqueue time, or when reloading from disk)
/// 2. `begin()` - mark in-flight for one send attempt
/// 3. `complete()` - remove (delivery acknowledged), or
///    `abort()` - return to pending with an attempt timestamp
#[derive(Debug, Default)]
pub struct OutboxQueue {
    items: BTreeMap<u64, QueuedEvent>,
    in_flight: BTreeSet<u64>,
}

impl OutboxQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event to the queue.
    ///
    /// Inserting a sequence number that is already present replaces the
    /// stored item (used when reloading persisted state).
    pub fn insert(&mut self, item: QueuedEvent) {
        self.items.insert(item.seq, item);
    }

    /// Sequence numbers of all pending items, in enqueue order.
    ///
    /// Items currently in flight are excluded; they belong to another
    /// send attempt.
    pub fn pending_seqs(&self) -> Vec<u64> {
        self.items
            .keys()
            .filter(|seq| !self.in_flight.contains(*seq))
            .copied()
            .collect()
    }

    /// Claim an item for a single send attempt.
    ///
    /// Returns `None` if the item is unknown or already claimed, which
    /// guarantees no two attempts ever carry the same item concurrently.
    pub fn begin(&mut self, seq: u64) -> Option<QueuedEvent> {
        let item = self.items.get(&seq)?;
        if !self.in_flight.insert(seq) {
            return None;
        }
        Some(item.clone())
    }

    /// Acknowledge successful delivery; the item is gone for good.
    pub fn complete(&mut self, seq: u64) {
        self.in_flight.remove(&seq);
        self.items.remove(&seq);
    }

    /// Return a claimed item to the pending set after a failed attempt.
    ///
    /// The item keeps its sequence number, so its position in the queue
    /// is unchanged. `attempted_at` is recorded for status reporting.
    pub fn abort(&mut self, seq: u64, attempted_at: Option<i64>) {
        self.in_flight.remove(&seq);
        if let Some(item) = self.items.get_mut(&seq) {
            if attempted_at.is_some() {
                item.last_attempt_at = attempted_at;
            }
        }
    }

    /// Whether an item is currently claimed by a send attempt.
    pub fn is_in_flight(&self, seq: u64) -> bool {
        self.in_flight.contains(&seq)
    }

    /// Total number of items (pending and in flight).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds no items at all.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// When delivery of any item was last attempted (unix ms).
    pub fn last_attempt_at(&self) -> Option<i64> {
        self.items.values().filter_map(|i| i.last_attempt_at).max()
    }

    /// Drop every item, pending or in flight.
    pub fn clear(&mut self) {
        self.items.clear();
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repsync_types::{FetchProgram, RequestSync};

    fn make_item(seq: u64) -> QueuedEvent {
        QueuedEvent {
            seq,
            event: SyncEvent::FetchProgram(FetchProgram {}),
            enqueued_at: 1_700_000_000_000 + seq as i64,
            last_attempt_at: None,
        }
    }

    #[test]
    fn pending_seqs_preserve_enqueue_order() {
        let mut queue = OutboxQueue::new();
        // Insert out of order; iteration is by seq.
        queue.insert(make_item(3));
        queue.insert(make_item(1));
        queue.insert(make_item(2));

        assert_eq!(queue.pending_seqs(), vec![1, 2, 3]);
    }

    #[test]
    fn begin_claims_exactly_once() {
        let mut queue = OutboxQueue::new();
        queue.insert(make_item(1));

        assert!(queue.begin(1).is_some());
        assert!(queue.is_in_flight(1));
        // A second concurrent claim is refused.
        assert!(queue.begin(1).is_none());
    }

    #[test]
    fn in_flight_items_are_hidden_from_pending() {
        let mut queue = OutboxQueue::new();
        queue.insert(make_item(1));
        queue.insert(make_item(2));

        queue.begin(1);
        assert_eq!(queue.pending_seqs(), vec![2]);
    }

    #[test]
    fn complete_removes_item() {
        let mut queue = OutboxQueue::new();
        queue.insert(make_item(1));

        queue.begin(1);
        queue.complete(1);

        assert!(queue.is_empty());
        assert!(!queue.is_in_flight(1));
    }

    #[test]
    fn abort_keeps_item_and_position() {
        let mut queue = OutboxQueue::new();
        queue.insert(make_item(1));
        queue.insert(make_item(2));

        queue.begin(1);
        queue.abort(1, Some(1_700_000_099_000));

        // Still first in line, claimable again.
        assert_eq!(queue.pending_seqs(), vec![1, 2]);
        let retry = queue.begin(1).unwrap();
        assert_eq!(retry.last_attempt_at, Some(1_700_000_099_000));
    }

    #[test]
    fn last_attempt_at_tracks_newest_attempt() {
        let mut queue = OutboxQueue::new();
        queue.insert(make_item(1));
        queue.insert(make_item(2));
        assert_eq!(queue.last_attempt_at(), None);

        queue.begin(1);
        queue.abort(1, Some(100));
        queue.begin(2);
        queue.abort(2, Some(200));

        assert_eq!(queue.last_attempt_at(), Some(200));
    }

    #[test]
    fn begin_unknown_seq_returns_none() {
        let mut queue = OutboxQueue::new();
        assert!(queue.begin(42).is_none());
    }

    #[test]
    fn complete_unknown_is_no_op() {
        let mut queue = OutboxQueue::new();
        queue.complete(42);
        assert!(queue.is_empty());
    }

    #[test]
    fn abort_without_timestamp_keeps_previous() {
        let mut queue = OutboxQueue::new();
        let mut item = make_item(1);
        item.last_attempt_at = Some(50);
        queue.insert(item);

        queue.begin(1);
        queue.abort(1, None);

        assert_eq!(queue.last_attempt_at(), Some(50));
    }

    #[test]
    fn clear_removes_everything() {
        let mut queue = OutboxQueue::new();
        queue.insert(QueuedEvent {
            seq: 1,
            event: SyncEvent::RequestSync(RequestSync {}),
            enqueued_at: 0,
            last_attempt_at: None,
        });
        queue.begin(1);

        queue.clear();

        assert!(queue.is_empty());
        assert!(!queue.is_in_flight(1));
    }
}
