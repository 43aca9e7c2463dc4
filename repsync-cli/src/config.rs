//! Configuration management for repsync-cli.
//!
//! Two files live in the data directory:
//! - `device.json` - this device's identity (written by `repsync init`)
//! - `repsync.toml` - optional engine settings with defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use repsync_types::{DeviceId, DeviceRole};

/// Device identity stored locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Unique device identifier.
    pub device_id: String,
    /// Human-readable device name.
    pub device_name: String,
    /// Which side of the link this device plays.
    pub role: DeviceRole,
    /// When the device was initialized (unix seconds).
    pub created_at: u64,
}

impl DeviceProfile {
    /// Create a new device profile.
    pub fn new(name: &str, role: DeviceRole) -> Self {
        Self {
            device_id: DeviceId::new().to_string(),
            device_name: name.to_string(),
            role,
            created_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Load the device profile from a directory.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("device.json");
        let contents = tokio::fs::read_to_string(&path)
            .await
            .context("Device not initialized. Run 'repsync init' first.")?;
        serde_json::from_str(&contents).context("Invalid device profile")
    }

    /// Save the device profile to a directory.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join("device.json");
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save device profile")?;
        Ok(())
    }

    /// Check if the device is initialized.
    pub async fn exists(data_dir: &Path) -> bool {
        data_dir.join("device.json").exists()
    }

    /// Parse the stored device id.
    pub fn parsed_id(&self) -> Result<DeviceId> {
        self.device_id
            .parse()
            .context("Corrupt device id in device.json")
    }
}

/// Engine settings loaded from `repsync.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineSettings,
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Bound on every immediate send attempt, in milliseconds.
    #[serde(default = "default_immediate_timeout_ms")]
    pub immediate_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            immediate_timeout_ms: default_immediate_timeout_ms(),
        }
    }
}

fn default_immediate_timeout_ms() -> u64 {
    5000
}

impl Settings {
    /// Load settings from the data directory, defaulting every field
    /// when the file is absent.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("repsync.toml");
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => toml::from_str(&contents).context("Invalid repsync.toml"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).context("Failed to read repsync.toml"),
        }
    }

    /// The immediate-send timeout as a duration.
    pub fn immediate_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.immediate_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn device_profile_roundtrip() {
        let dir = tempdir().unwrap();
        let profile = DeviceProfile::new("Test Watch", DeviceRole::Companion);
        profile.save(dir.path()).await.unwrap();

        let loaded = DeviceProfile::load(dir.path()).await.unwrap();
        assert_eq!(loaded.device_name, "Test Watch");
        assert_eq!(loaded.role, DeviceRole::Companion);
        assert!(loaded.parsed_id().is_ok());
    }

    #[tokio::test]
    async fn load_without_init_is_a_helpful_error() {
        let dir = tempdir().unwrap();
        let err = DeviceProfile::load(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("repsync init"));
    }

    #[tokio::test]
    async fn settings_default_when_file_missing() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(dir.path()).await.unwrap();
        assert_eq!(settings.engine.immediate_timeout_ms, 5000);
    }

    #[tokio::test]
    async fn settings_parse_from_toml() {
        let dir = tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("repsync.toml"),
            "[engine]\nimmediate_timeout_ms = 750\n",
        )
        .await
        .unwrap();

        let settings = Settings::load(dir.path()).await.unwrap();
        assert_eq!(settings.immediate_timeout(), Duration::from_millis(750));
    }
}
