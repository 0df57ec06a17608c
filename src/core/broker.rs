//! The DB Broker is the single path for state access.
//!
//! - Writes are serialized through a per-database mutex and run inside one
//!   `IMMEDIATE` transaction: the closure's reads, checks and writes commit
//!   together or not at all.
//! - Reads open a fresh connection and run inside a deferred transaction, so
//!   every query in the closure sees the same WAL snapshot.

use crate::core::db;
use crate::core::error::FibermapError;
use rusqlite::{Connection, TransactionBehavior};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

/// Per-database write mutexes, shared by every broker in the process.
fn write_locks() -> &'static Mutex<HashMap<PathBuf, &'static Mutex<()>>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, &'static Mutex<()>>>> = OnceLock::new();
    LOCKS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn write_lock_for(db_path: &Path) -> Result<&'static Mutex<()>, FibermapError> {
    let mut locks = write_locks()
        .lock()
        .map_err(|_| FibermapError::Unavailable("broker lock table poisoned".to_string()))?;
    if let Some(lock) = locks.get(db_path) {
        return Ok(*lock);
    }
    let lock: &'static Mutex<()> = Box::leak(Box::new(Mutex::new(())));
    locks.insert(db_path.to_path_buf(), lock);
    Ok(lock)
}

#[derive(Debug, Clone)]
pub struct DbBroker {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl DbBroker {
    pub fn new(db_path: &Path, busy_timeout: Duration) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            busy_timeout,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` inside a serialized IMMEDIATE transaction.
    pub fn with_write<F, R>(&self, op_name: &str, f: F) -> Result<R, FibermapError>
    where
        F: FnOnce(&Connection) -> Result<R, FibermapError>,
    {
        let lock = write_lock_for(&self.db_path)?;
        let _guard = lock
            .lock()
            .map_err(|_| FibermapError::Unavailable("write lock poisoned".to_string()))?;

        let started = Instant::now();
        let mut conn = db::db_connect(&self.db_path, self.busy_timeout)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Dropping `tx` without commit rolls back.
        let result = f(&*tx).and_then(|value| {
            tx.commit()?;
            Ok(value)
        });

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(op = op_name, elapsed_ms, "mutation committed"),
            Err(e) => tracing::warn!(
                op = op_name,
                kind = e.kind().as_str(),
                elapsed_ms,
                "mutation rejected: {}",
                e.detail()
            ),
        }
        result
    }

    /// Run `f` against one consistent read snapshot.
    pub fn with_read<F, R>(&self, op_name: &str, f: F) -> Result<R, FibermapError>
    where
        F: FnOnce(&Connection) -> Result<R, FibermapError>,
    {
        let mut conn = db::db_connect(&self.db_path, self.busy_timeout)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let result = f(&*tx);
        if let Err(e) = &result {
            tracing::debug!(op = op_name, kind = e.kind().as_str(), "read failed: {}", e.detail());
        }
        result
    }
}
