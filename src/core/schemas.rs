//! Centralized database schema definitions.
//!
//! One SQLite database holds the whole inventory. Parent/child relations are
//! plain foreign-key columns; nothing stores back-pointers or child arrays.

pub const DB_SCHEMA_HEADENDS: &str = "
    CREATE TABLE IF NOT EXISTS headends (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        location TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
";

pub const DB_SCHEMA_FDHS: &str = "
    CREATE TABLE IF NOT EXISTS fdhs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        location TEXT NOT NULL DEFAULT '',
        region TEXT,
        max_ports INTEGER NOT NULL CHECK (max_ports > 0),
        headend_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY(headend_id) REFERENCES headends(id)
    )
";

pub const DB_SCHEMA_SPLITTERS: &str = "
    CREATE TABLE IF NOT EXISTS splitters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        model TEXT NOT NULL,
        location TEXT NOT NULL DEFAULT '',
        port_capacity INTEGER NOT NULL CHECK (port_capacity > 0),
        used_ports INTEGER NOT NULL DEFAULT 0
            CHECK (used_ports >= 0 AND used_ports <= port_capacity),
        fdh_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY(fdh_id) REFERENCES fdhs(id)
    )
";

pub const DB_SCHEMA_CUSTOMERS: &str = "
    CREATE TABLE IF NOT EXISTS customers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        address TEXT NOT NULL DEFAULT '',
        neighborhood TEXT,
        plan TEXT,
        connection_type TEXT NOT NULL DEFAULT 'Wired',
        status TEXT NOT NULL DEFAULT 'Pending',
        splitter_id INTEGER,
        assigned_port INTEGER,
        created_at TEXT NOT NULL,
        FOREIGN KEY(splitter_id) REFERENCES splitters(id)
    )
";

pub const DB_SCHEMA_ASSETS: &str = "
    CREATE TABLE IF NOT EXISTS assets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        serial_number TEXT NOT NULL UNIQUE,
        model TEXT NOT NULL,
        asset_type TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'Available',
        location TEXT,
        assigned_customer_id INTEGER,
        assigned_on TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY(assigned_customer_id) REFERENCES customers(id)
    )
";

pub const DB_SCHEMA_AUDIT_LOG: &str = "
    CREATE TABLE IF NOT EXISTS audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id TEXT NOT NULL,
        ts TEXT NOT NULL,
        action_type TEXT NOT NULL,
        description TEXT NOT NULL
    )
";

pub const DB_SCHEMA_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_fdhs_headend ON fdhs(headend_id)",
    "CREATE INDEX IF NOT EXISTS idx_splitters_fdh ON splitters(fdh_id)",
    "CREATE INDEX IF NOT EXISTS idx_customers_splitter ON customers(splitter_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_port
        ON customers(splitter_id, assigned_port) WHERE splitter_id IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS idx_assets_customer ON assets(assigned_customer_id)",
];

/// Tables in creation order (parents first).
pub const DB_SCHEMA_TABLES: &[&str] = &[
    DB_SCHEMA_HEADENDS,
    DB_SCHEMA_FDHS,
    DB_SCHEMA_SPLITTERS,
    DB_SCHEMA_CUSTOMERS,
    DB_SCHEMA_ASSETS,
    DB_SCHEMA_AUDIT_LOG,
];
