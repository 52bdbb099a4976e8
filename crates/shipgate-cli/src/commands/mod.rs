pub mod app;
pub mod check;
pub mod policy;

use std::path::{Path, PathBuf};

use shipgate_core::ShipgateConfig;
use shipgate_state::StateStore;
use tracing::debug;

/// Configuration plus an open state store, shared by every subcommand.
pub struct Context {
    pub config: ShipgateConfig,
    pub store: StateStore,
}

impl Context {
    pub fn load(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = match config_path {
            Some(path) => ShipgateConfig::from_file(path)?,
            None => ShipgateConfig::default(),
        };
        if let Some(dir) = data_dir {
            config.store.data_dir = dir;
        }

        std::fs::create_dir_all(&config.store.data_dir)?;
        let db_path = config.store.db_path();
        let store = StateStore::open(&db_path)?;
        debug!(path = ?db_path, "state store ready");

        Ok(Self { config, store })
    }
}
