//! CLI command implementations.

pub mod demo;
pub mod flush;
pub mod init;
pub mod log;
pub mod resume;
pub mod start;
pub mod status;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use repsync_engine::{EngineConfig, MockTransport, SyncEngine};
use repsync_store::open_with_fallback;

use crate::config::{DeviceProfile, Settings};

/// Open the local engine over the device store.
///
/// The CLI has no live wireless link, so the transport is a mock that is
/// never reachable: every outbound event queues durably and `flush`
/// reports it as pending. This matches what the engine does on a real
/// device whenever the peer is away.
pub async fn open_engine(data_dir: &Path) -> Result<Arc<SyncEngine<MockTransport>>> {
    let profile = DeviceProfile::load(data_dir).await?;
    let settings = Settings::load(data_dir).await?;
    let store = open_with_fallback(data_dir).await?;

    let config = EngineConfig::new(profile.parsed_id()?, profile.role)
        .with_immediate_timeout(settings.immediate_timeout());
    let transport = Arc::new(MockTransport::new());

    let engine = SyncEngine::new(config, store, transport).await?;
    engine.activate().await?;
    Ok(Arc::new(engine))
}

/// Format a unix-seconds timestamp as a rough age string.
pub fn format_age(created_at: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let diff = now.saturating_sub(created_at);

    if diff < 60 {
        format!("{diff}s ago")
    } else if diff < 3600 {
        format!("{}m ago", diff / 60)
    } else if diff < 86_400 {
        format!("{}h ago", diff / 3600)
    } else {
        format!("{}d ago", diff / 86_400)
    }
}
