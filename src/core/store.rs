//! Store handle for a Fibermap data root.
//!
//! A Store is the logical container for the inventory database and its
//! configuration. Every operation in `network` takes a `&Store`.

use crate::core::broker::DbBroker;
use crate::core::config::Config;
use crate::core::db;
use crate::core::error::FibermapError;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the data root directory
    pub root: PathBuf,
    pub config: Config,
}

impl Store {
    /// Open the store at `root` with `config`, creating the schema if needed.
    pub fn with_config(root: PathBuf, config: Config) -> Result<Store, FibermapError> {
        config.validate()?;
        let store = Store { root, config };
        db::initialize_db(&store.db_path(), store.busy_timeout())?;
        Ok(store)
    }

    pub fn db_path(&self) -> PathBuf {
        self.config.db_path(&self.root)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.config.store.busy_timeout_ms)
    }

    pub fn broker(&self) -> DbBroker {
        DbBroker::new(&self.db_path(), self.busy_timeout())
    }
}
