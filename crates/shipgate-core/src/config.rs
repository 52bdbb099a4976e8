//! shipgate.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of optimistic-concurrency attempts per reconciliation pass.
pub const DEFAULT_MAX_UPDATE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipgateConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/shipgate"),
        }
    }
}

impl StoreConfig {
    /// Location of the redb file inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("shipgate.redb")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Write attempts before a conflicting update is given up for this pass.
    pub max_update_attempts: u32,
    /// Record blocking/override notifications.
    pub emit_events: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_update_attempts: DEFAULT_MAX_UPDATE_ATTEMPTS,
            emit_events: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,shipgate=debug".to_string(),
        }
    }
}

impl ShipgateConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ShipgateConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
