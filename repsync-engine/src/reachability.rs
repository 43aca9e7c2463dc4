//! Reachability monitor.
//!
//! Watches the transport's connectivity path and forwards changes into
//! the engine's link state machine, which turns them into single-fire
//! "became reachable" flushes. The monitor itself performs no retries
//! and holds no state beyond the watch channel's last-known value.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::engine::SyncEngine;
use crate::transport::Transport;

/// Spawns the path-watching task for an engine.
pub struct ReachabilityMonitor;

impl ReachabilityMonitor {
    /// Watch the engine's transport until the transport is dropped.
    pub fn spawn<T>(engine: Arc<SyncEngine<T>>) -> JoinHandle<()>
    where
        T: Transport + 'static,
    {
        let mut rx = engine.transport().reachability_changes();
        tokio::spawn(async move {
            // Seed the link state with the current value, then follow
            // every change.
            let initial = *rx.borrow_and_update();
            engine.on_reachability(initial).await;
            while rx.changed().await.is_ok() {
                let reachable = *rx.borrow_and_update();
                engine.on_reachability(reachable).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::transport::MockTransport;
    use repsync_store::SqliteStore;
    use repsync_types::{DeviceId, DeviceRole, FetchProgram, SyncEvent};
    use std::time::Duration;

    async fn companion_engine(transport: MockTransport) -> Arc<SyncEngine<MockTransport>> {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let config = EngineConfig::new(DeviceId::new(), DeviceRole::Companion)
            .with_immediate_timeout(Duration::from_millis(200));
        Arc::new(
            SyncEngine::new(config, store, Arc::new(transport))
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn restored_reachability_triggers_flush() {
        let transport = MockTransport::new();
        transport.activate().await.unwrap();
        let engine = companion_engine(transport.clone()).await;
        engine.activate().await.unwrap();

        // Queue an event while offline.
        engine
            .request_active_workout()
            .await
            .expect("enqueue while offline");
        assert_eq!(engine.queue_status().await.pending, 1);

        let monitor = ReachabilityMonitor::spawn(Arc::clone(&engine));
        transport.set_reachable(true);

        // Give the monitor task a moment to observe the edge and drain.
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if engine.queue_status().await.pending == 0 {
                break;
            }
        }

        assert_eq!(engine.queue_status().await.pending, 0);
        assert_eq!(transport.sent_immediate().len(), 1);
        monitor.abort();
    }

    #[tokio::test]
    async fn repeated_online_reports_do_not_resend() {
        let transport = MockTransport::new();
        transport.activate().await.unwrap();
        let engine = companion_engine(transport.clone()).await;
        engine.activate().await.unwrap();

        let monitor = ReachabilityMonitor::spawn(Arc::clone(&engine));

        transport.set_reachable(true);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Deliver one event while online, then flap "online" again.
        engine
            .handle_incoming(SyncEvent::FetchProgram(FetchProgram {}))
            .await
            .unwrap();
        transport.set_reachable(true);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Nothing was queued, so nothing to send; the monitor must not
        // have invented traffic.
        assert_eq!(engine.queue_status().await.pending, 0);
        monitor.abort();
    }
}
