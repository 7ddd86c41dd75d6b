//! Portal configuration.

use crate::error::ConfigError;
use portal_codec::MAX_FRAME_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Configuration for a [`DataPortal`](crate::DataPortal) and its executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Upper bound on one remote call, channel round trip included (ms).
    pub timeout_ms: u64,
    /// Run local executions on a spawned task instead of the caller's.
    pub run_local_on_worker: bool,
    /// Largest frame a remote proxy or host accepts.
    pub max_frame_bytes: usize,
    /// How many completed calls the dashboard keeps.
    pub recent_activity_count: usize,
    /// Dashboard drain period (ms).
    pub dashboard_period_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            run_local_on_worker: false,
            max_frame_bytes: MAX_FRAME_SIZE,
            recent_activity_count: 100,
            dashboard_period_ms: 500,
        }
    }
}

impl PortalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn dashboard_period(&self) -> Duration {
        Duration::from_millis(self.dashboard_period_ms)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Loads configuration from a TOML file. A missing file yields the
    /// defaults; an unreadable or invalid one is an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No portal config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded portal config from {:?}", path);
        Ok(config)
    }
}
