use crate::core::error::FibermapError;
use crate::core::schemas;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub fn db_connect(db_path: &Path, busy_timeout: Duration) -> Result<Connection, FibermapError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(busy_timeout)
        .map_err(FibermapError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(FibermapError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(FibermapError::RusqliteError)?;
    Ok(conn)
}

/// Create the database file and every table/index if missing.
pub fn initialize_db(db_path: &Path, busy_timeout: Duration) -> Result<(), FibermapError> {
    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).map_err(FibermapError::IoError)?;
    }
    let conn = db_connect(db_path, busy_timeout)?;
    for table in schemas::DB_SCHEMA_TABLES {
        conn.execute(table, [])?;
    }
    for index in schemas::DB_SCHEMA_INDEXES {
        conn.execute(index, [])?;
    }
    Ok(())
}
