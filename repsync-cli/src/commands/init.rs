//! Initialize device identity.

use anyhow::{bail, Result};
use std::path::Path;

use repsync_types::DeviceRole;

use crate::config::DeviceProfile;

/// Run the init command.
pub async fn run(data_dir: &Path, name: &str, role: &str) -> Result<()> {
    if DeviceProfile::exists(data_dir).await {
        bail!("Device already initialized in {}", data_dir.display());
    }

    let role = match role {
        "primary" => DeviceRole::Primary,
        "companion" => DeviceRole::Companion,
        other => bail!("Unknown role '{other}' (expected 'primary' or 'companion')"),
    };

    let profile = DeviceProfile::new(name, role);
    profile.save(data_dir).await?;

    println!("Initialized {role:?} device '{name}'");
    println!("  ID:       {}", profile.device_id);
    println!("  Data dir: {}", data_dir.display());
    Ok(())
}
