//! Runtime configuration loaded from `<root>/fibermap.toml`.
//!
//! A missing file means defaults. Environment variables override the file:
//! - `FIBERMAP_DB`: absolute path of the SQLite database
//! - `FIBERMAP_LOG`: tracing filter directive (e.g. `fibermap=debug`)

use crate::core::error::FibermapError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "fibermap.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub topology: TopologyConfig,
    pub list: ListConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file name, relative to the data root.
    pub db_name: String,
    /// Explicit database path; wins over `db_name` when set.
    pub db_path: Option<PathBuf>,
    /// SQLite busy timeout. Kept short so a wedged store fails fast.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_name: "fibermap.db".to_string(),
            db_path: None,
            busy_timeout_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TopologyConfig {
    /// Hard cap on nodes in a single topology response.
    pub max_nodes: usize,
    /// Levels walked below the anchor.
    pub max_depth: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            max_nodes: 500,
            max_depth: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load `fibermap.toml` from `root`, then apply environment overrides.
    pub fn load(root: &Path) -> Result<Config, FibermapError> {
        let config_path = root.join(CONFIG_FILE_NAME);
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).map_err(FibermapError::IoError)?;
            Config::from_toml_str(&content)?
        } else {
            Config::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Config, FibermapError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| FibermapError::ConfigError(format!("{}: {}", CONFIG_FILE_NAME, e)))?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(path) = env::var("FIBERMAP_DB")
            && !path.trim().is_empty()
        {
            self.store.db_path = Some(PathBuf::from(path));
        }
        if let Ok(filter) = env::var("FIBERMAP_LOG")
            && !filter.trim().is_empty()
        {
            self.log.filter = filter;
        }
    }

    pub fn validate(&self) -> Result<(), FibermapError> {
        if self.topology.max_nodes == 0 {
            return Err(FibermapError::ConfigError(
                "topology.max_nodes must be at least 1".to_string(),
            ));
        }
        if self.topology.max_depth == 0 {
            return Err(FibermapError::ConfigError(
                "topology.max_depth must be at least 1".to_string(),
            ));
        }
        if self.list.default_limit > self.list.max_limit {
            return Err(FibermapError::ConfigError(format!(
                "list.default_limit ({}) exceeds list.max_limit ({})",
                self.list.default_limit, self.list.max_limit
            )));
        }
        if self.store.db_name.trim().is_empty() {
            return Err(FibermapError::ConfigError(
                "store.db_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn db_path(&self, root: &Path) -> PathBuf {
        match &self.store.db_path {
            Some(p) => p.clone(),
            None => root.join(&self.store.db_name),
        }
    }
}
