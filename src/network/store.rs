//! Entity Store: typed row access over the inventory tables.
//!
//! Holds no business rules beyond primary keys, serial uniqueness and the
//! child-count check on delete. Capacity and linkage rules live in
//! `integrity`, which calls into this module inside its write transaction.

use crate::core::error::FibermapError;
use crate::core::time;
use crate::network::model::{
    Asset, AssetStatus, AssetType, AuditEntry, Customer, CustomerStatus, EntityId, Fdh, Headend,
    ListFilter, NewAsset, NewCustomer, NewFdh, NewHeadend, NewSplitter, Splitter,
};
use rusqlite::{Connection, OptionalExtension, Row, params, types::ToSql};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Headend,
    Fdh,
    Splitter,
    Customer,
    Asset,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Headend => "Headend",
            EntityKind::Fdh => "FDH",
            EntityKind::Splitter => "Splitter",
            EntityKind::Customer => "Customer",
            EntityKind::Asset => "Asset",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Child relation consulted before a delete.
pub struct ChildRelation {
    pub table: &'static str,
    pub fk_column: &'static str,
    pub label: &'static str,
}

pub trait Entity: Sized + Serialize {
    const KIND: EntityKind;
    const TABLE: &'static str;
    const COLUMNS: &'static str;
    const TYPE_COLUMN: Option<&'static str> = None;
    const STATUS_COLUMN: Option<&'static str> = None;
    const LOCATION_COLUMN: Option<&'static str> = None;
    const CHILDREN: Option<ChildRelation> = None;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn id(&self) -> EntityId;

    /// Canonical stored form of a `type` filter value.
    fn canonical_type(raw: &str) -> Result<String, FibermapError> {
        Ok(raw.to_string())
    }

    /// Canonical stored form of a `status` filter value.
    fn canonical_status(raw: &str) -> Result<String, FibermapError> {
        Ok(raw.to_string())
    }
}

impl Entity for Headend {
    const KIND: EntityKind = EntityKind::Headend;
    const TABLE: &'static str = "headends";
    const COLUMNS: &'static str = "id, name, location, created_at";
    const LOCATION_COLUMN: Option<&'static str> = Some("location");
    const CHILDREN: Option<ChildRelation> = Some(ChildRelation {
        table: "fdhs",
        fk_column: "headend_id",
        label: "FDH",
    });

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Headend {
            id: row.get(0)?,
            name: row.get(1)?,
            location: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn id(&self) -> EntityId {
        self.id
    }
}

impl Entity for Fdh {
    const KIND: EntityKind = EntityKind::Fdh;
    const TABLE: &'static str = "fdhs";
    const COLUMNS: &'static str = "id, name, location, region, max_ports, headend_id, created_at";
    const LOCATION_COLUMN: Option<&'static str> = Some("location");
    const CHILDREN: Option<ChildRelation> = Some(ChildRelation {
        table: "splitters",
        fk_column: "fdh_id",
        label: "splitter",
    });

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Fdh {
            id: row.get(0)?,
            name: row.get(1)?,
            location: row.get(2)?,
            region: row.get(3)?,
            max_ports: row.get(4)?,
            headend_id: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn id(&self) -> EntityId {
        self.id
    }
}

impl Entity for Splitter {
    const KIND: EntityKind = EntityKind::Splitter;
    const TABLE: &'static str = "splitters";
    const COLUMNS: &'static str =
        "id, model, location, port_capacity, used_ports, fdh_id, created_at";
    const TYPE_COLUMN: Option<&'static str> = Some("model");
    const LOCATION_COLUMN: Option<&'static str> = Some("location");
    const CHILDREN: Option<ChildRelation> = Some(ChildRelation {
        table: "customers",
        fk_column: "splitter_id",
        label: "customer",
    });

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Splitter {
            id: row.get(0)?,
            model: row.get(1)?,
            location: row.get(2)?,
            port_capacity: row.get(3)?,
            used_ports: row.get(4)?,
            fdh_id: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn id(&self) -> EntityId {
        self.id
    }
}

impl Entity for Customer {
    const KIND: EntityKind = EntityKind::Customer;
    const TABLE: &'static str = "customers";
    const COLUMNS: &'static str = "id, name, address, neighborhood, plan, connection_type, status, splitter_id, assigned_port, created_at";
    const TYPE_COLUMN: Option<&'static str> = Some("connection_type");
    const STATUS_COLUMN: Option<&'static str> = Some("status");
    const LOCATION_COLUMN: Option<&'static str> = Some("address");
    const CHILDREN: Option<ChildRelation> = Some(ChildRelation {
        table: "assets",
        fk_column: "assigned_customer_id",
        label: "assigned asset",
    });

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Customer {
            id: row.get(0)?,
            name: row.get(1)?,
            address: row.get(2)?,
            neighborhood: row.get(3)?,
            plan: row.get(4)?,
            connection_type: row.get(5)?,
            status: row.get(6)?,
            splitter_id: row.get(7)?,
            assigned_port: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn canonical_type(raw: &str) -> Result<String, FibermapError> {
        Ok(raw
            .parse::<crate::network::model::ConnectionType>()?
            .as_str()
            .to_string())
    }

    fn canonical_status(raw: &str) -> Result<String, FibermapError> {
        Ok(raw.parse::<CustomerStatus>()?.as_str().to_string())
    }
}

impl Entity for Asset {
    const KIND: EntityKind = EntityKind::Asset;
    const TABLE: &'static str = "assets";
    const COLUMNS: &'static str = "id, serial_number, model, asset_type, status, location, assigned_customer_id, assigned_on, created_at";
    const TYPE_COLUMN: Option<&'static str> = Some("asset_type");
    const STATUS_COLUMN: Option<&'static str> = Some("status");
    const LOCATION_COLUMN: Option<&'static str> = Some("location");

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Asset {
            id: row.get(0)?,
            serial_number: row.get(1)?,
            model: row.get(2)?,
            asset_type: row.get(3)?,
            status: row.get(4)?,
            location: row.get(5)?,
            assigned_customer_id: row.get(6)?,
            assigned_on: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn canonical_type(raw: &str) -> Result<String, FibermapError> {
        Ok(raw.parse::<AssetType>()?.as_str().to_string())
    }

    fn canonical_status(raw: &str) -> Result<String, FibermapError> {
        Ok(raw.parse::<AssetStatus>()?.as_str().to_string())
    }
}

// --- Generic accessors ---

pub fn find<T: Entity>(conn: &Connection, id: EntityId) -> Result<Option<T>, FibermapError> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?1", T::COLUMNS, T::TABLE);
    let record = conn
        .query_row(&sql, params![id], |row| T::from_row(row))
        .optional()?;
    Ok(record)
}

pub fn get<T: Entity>(conn: &Connection, id: EntityId) -> Result<T, FibermapError> {
    find::<T>(conn, id)?
        .ok_or_else(|| FibermapError::NotFound(format!("{} {} not found", T::KIND, id)))
}

pub fn exists<T: Entity>(conn: &Connection, id: EntityId) -> Result<bool, FibermapError> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", T::TABLE);
    let found: Option<i64> = conn
        .query_row(&sql, params![id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Filtered, paged listing in ascending id (creation) order.
///
/// `limit` of `None` means no paging; callers at the request boundary apply
/// their configured default before getting here.
pub fn list<T: Entity>(conn: &Connection, filter: &ListFilter) -> Result<Vec<T>, FibermapError> {
    let mut query = format!("SELECT {} FROM {} WHERE 1=1", T::COLUMNS, T::TABLE);
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(raw) = non_empty(&filter.asset_type) {
        let column = T::TYPE_COLUMN.ok_or_else(|| unsupported_filter::<T>("type"))?;
        query.push_str(&format!(" AND {} = ?", column));
        params.push(Box::new(T::canonical_type(raw)?));
    }
    if let Some(raw) = non_empty(&filter.status) {
        let column = T::STATUS_COLUMN.ok_or_else(|| unsupported_filter::<T>("status"))?;
        query.push_str(&format!(" AND {} = ?", column));
        params.push(Box::new(T::canonical_status(raw)?));
    }
    if let Some(raw) = non_empty(&filter.location) {
        let column = T::LOCATION_COLUMN.ok_or_else(|| unsupported_filter::<T>("location"))?;
        // LIKE is case-insensitive for ASCII in SQLite.
        query.push_str(&format!(" AND {} LIKE ? ESCAPE '\\'", column));
        params.push(Box::new(format!("%{}%", escape_like(raw))));
    }

    query.push_str(" ORDER BY id ASC");
    if filter.limit.is_some() || filter.skip.is_some() {
        query.push_str(" LIMIT ? OFFSET ?");
        let limit = match filter.limit {
            Some(limit) => page_bound("limit", limit)?,
            None => -1,
        };
        params.push(Box::new(limit));
        params.push(Box::new(page_bound("skip", filter.skip.unwrap_or(0))?));
    }

    let mut stmt = conn.prepare(&query)?;
    let params_as_dyn: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(&params_as_dyn[..], |row| T::from_row(row))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn page_bound(name: &str, value: usize) -> Result<i64, FibermapError> {
    i64::try_from(value)
        .map_err(|_| FibermapError::InvalidQuery(format!("{} is out of range: {}", name, value)))
}

/// Delete a record. Fails with `HasDependents` while children reference it.
pub fn delete<T: Entity>(conn: &Connection, id: EntityId) -> Result<(), FibermapError> {
    if !exists::<T>(conn, id)? {
        return Err(FibermapError::NotFound(format!("{} {} not found", T::KIND, id)));
    }
    if let Some(children) = T::CHILDREN {
        let count = child_count(conn, &children, id)?;
        if count > 0 {
            return Err(FibermapError::HasDependents(format!(
                "{} {} still has {} {}(s)",
                T::KIND,
                id,
                count,
                children.label
            )));
        }
    }
    let sql = format!("DELETE FROM {} WHERE id = ?1", T::TABLE);
    conn.execute(&sql, params![id])?;
    Ok(())
}

fn child_count(
    conn: &Connection,
    relation: &ChildRelation,
    id: EntityId,
) -> Result<i64, FibermapError> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?1",
        relation.table, relation.fk_column
    );
    Ok(conn.query_row(&sql, params![id], |row| row.get(0))?)
}

/// Whether any child row references `id` through the kind's child relation.
pub fn has_children<T: Entity>(conn: &Connection, id: EntityId) -> Result<bool, FibermapError> {
    match T::CHILDREN {
        Some(children) => Ok(child_count(conn, &children, id)? > 0),
        None => Ok(false),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn unsupported_filter<T: Entity>(name: &str) -> FibermapError {
    FibermapError::InvalidQuery(format!(
        "{} records cannot be filtered by {}",
        T::KIND,
        name
    ))
}

// --- Per-kind puts ---

fn map_unique(err: rusqlite::Error, detail: String) -> FibermapError {
    match &err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            FibermapError::Conflict(detail)
        }
        _ => FibermapError::RusqliteError(err),
    }
}

pub fn insert_headend(conn: &Connection, new: &NewHeadend) -> Result<Headend, FibermapError> {
    conn.execute(
        "INSERT INTO headends(name, location, created_at) VALUES(?1, ?2, ?3)",
        params![new.name, new.location, time::now_epoch_z()],
    )
    .map_err(|e| map_unique(e, format!("Headend named '{}' already exists", new.name)))?;
    get::<Headend>(conn, conn.last_insert_rowid())
}

pub fn insert_fdh(conn: &Connection, new: &NewFdh) -> Result<Fdh, FibermapError> {
    conn.execute(
        "INSERT INTO fdhs(name, location, region, max_ports, headend_id, created_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.name,
            new.location,
            new.region,
            new.max_ports,
            new.headend_id,
            time::now_epoch_z()
        ],
    )
    .map_err(|e| map_unique(e, format!("FDH named '{}' already exists", new.name)))?;
    get::<Fdh>(conn, conn.last_insert_rowid())
}

pub fn insert_splitter(conn: &Connection, new: &NewSplitter) -> Result<Splitter, FibermapError> {
    conn.execute(
        "INSERT INTO splitters(model, location, port_capacity, used_ports, fdh_id, created_at)
         VALUES(?1, ?2, ?3, 0, ?4, ?5)",
        params![
            new.model,
            new.location,
            new.port_capacity,
            new.fdh_id,
            time::now_epoch_z()
        ],
    )?;
    get::<Splitter>(conn, conn.last_insert_rowid())
}

pub fn insert_customer(conn: &Connection, new: &NewCustomer) -> Result<Customer, FibermapError> {
    conn.execute(
        "INSERT INTO customers(name, address, neighborhood, plan, connection_type, status, created_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.name,
            new.address,
            new.neighborhood,
            new.plan,
            new.connection_type,
            new.status,
            time::now_epoch_z()
        ],
    )?;
    get::<Customer>(conn, conn.last_insert_rowid())
}

pub fn insert_asset(conn: &Connection, new: &NewAsset) -> Result<Asset, FibermapError> {
    conn.execute(
        "INSERT INTO assets(serial_number, model, asset_type, status, location, created_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.serial_number,
            new.model,
            new.asset_type,
            new.status,
            new.location,
            time::now_epoch_z()
        ],
    )
    .map_err(|e| {
        map_unique(
            e,
            format!(
                "Asset with serial number '{}' already exists",
                new.serial_number
            ),
        )
    })?;
    get::<Asset>(conn, conn.last_insert_rowid())
}

pub fn update_fdh_row(conn: &Connection, fdh: &Fdh) -> Result<Fdh, FibermapError> {
    conn.execute(
        "UPDATE fdhs SET name = ?1, location = ?2, region = ?3, max_ports = ?4 WHERE id = ?5",
        params![fdh.name, fdh.location, fdh.region, fdh.max_ports, fdh.id],
    )
    .map_err(|e| map_unique(e, format!("FDH named '{}' already exists", fdh.name)))?;
    get::<Fdh>(conn, fdh.id)
}

pub fn update_splitter_row(conn: &Connection, splitter: &Splitter) -> Result<Splitter, FibermapError> {
    conn.execute(
        "UPDATE splitters SET model = ?1, location = ?2, port_capacity = ?3, fdh_id = ?4 WHERE id = ?5",
        params![
            splitter.model,
            splitter.location,
            splitter.port_capacity,
            splitter.fdh_id,
            splitter.id
        ],
    )?;
    get::<Splitter>(conn, splitter.id)
}

pub fn update_customer_row(conn: &Connection, customer: &Customer) -> Result<Customer, FibermapError> {
    conn.execute(
        "UPDATE customers SET name = ?1, address = ?2, neighborhood = ?3, plan = ?4,
             connection_type = ?5, status = ?6, splitter_id = ?7, assigned_port = ?8
         WHERE id = ?9",
        params![
            customer.name,
            customer.address,
            customer.neighborhood,
            customer.plan,
            customer.connection_type,
            customer.status,
            customer.splitter_id,
            customer.assigned_port,
            customer.id
        ],
    )
    .map_err(|e| {
        map_unique(
            e,
            format!(
                "Port {:?} on splitter {:?} is already taken",
                customer.assigned_port, customer.splitter_id
            ),
        )
    })?;
    get::<Customer>(conn, customer.id)
}

pub fn update_asset_row(conn: &Connection, asset: &Asset) -> Result<Asset, FibermapError> {
    conn.execute(
        "UPDATE assets SET model = ?1, status = ?2, location = ?3,
             assigned_customer_id = ?4, assigned_on = ?5
         WHERE id = ?6",
        params![
            asset.model,
            asset.status,
            asset.location,
            asset.assigned_customer_id,
            asset.assigned_on,
            asset.id
        ],
    )?;
    get::<Asset>(conn, asset.id)
}

// --- Lookups and child queries ---

pub fn find_asset_by_serial(conn: &Connection, serial: &str) -> Result<Option<Asset>, FibermapError> {
    let sql = format!("SELECT {} FROM assets WHERE serial_number = ?1", Asset::COLUMNS);
    Ok(conn
        .query_row(&sql, params![serial], |row| Asset::from_row(row))
        .optional()?)
}

fn children_where<T: Entity>(
    conn: &Connection,
    fk_column: &str,
    parent_id: EntityId,
) -> Result<Vec<T>, FibermapError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1 ORDER BY id ASC",
        T::COLUMNS,
        T::TABLE,
        fk_column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![parent_id], |row| T::from_row(row))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn fdhs_of(conn: &Connection, headend_id: EntityId) -> Result<Vec<Fdh>, FibermapError> {
    children_where(conn, "headend_id", headend_id)
}

pub fn splitters_of(conn: &Connection, fdh_id: EntityId) -> Result<Vec<Splitter>, FibermapError> {
    children_where(conn, "fdh_id", fdh_id)
}

pub fn customers_of(conn: &Connection, splitter_id: EntityId) -> Result<Vec<Customer>, FibermapError> {
    children_where(conn, "splitter_id", splitter_id)
}

pub fn assets_of(conn: &Connection, customer_id: EntityId) -> Result<Vec<Asset>, FibermapError> {
    children_where(conn, "assigned_customer_id", customer_id)
}

/// Live count of customers attached to a splitter. The source of truth for `used_ports`.
pub fn attached_customer_count(conn: &Connection, splitter_id: EntityId) -> Result<u32, FibermapError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM customers WHERE splitter_id = ?1",
        params![splitter_id],
        |row| row.get(0),
    )?)
}

/// Sum of `port_capacity` over an FDH's splitters, optionally excluding one.
pub fn aggregate_capacity(
    conn: &Connection,
    fdh_id: EntityId,
    excluding_splitter: Option<EntityId>,
) -> Result<u32, FibermapError> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(port_capacity), 0) FROM splitters
         WHERE fdh_id = ?1 AND (?2 IS NULL OR id != ?2)",
        params![fdh_id, excluding_splitter],
        |row| row.get(0),
    )?)
}

/// Ports taken on a splitter, ascending.
pub fn occupied_ports(conn: &Connection, splitter_id: EntityId) -> Result<Vec<u32>, FibermapError> {
    let mut stmt = conn.prepare(
        "SELECT assigned_port FROM customers
         WHERE splitter_id = ?1 AND assigned_port IS NOT NULL
         ORDER BY assigned_port ASC",
    )?;
    let rows = stmt.query_map(params![splitter_id], |row| row.get::<_, u32>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn insert_audit(
    conn: &Connection,
    action_type: &str,
    description: &str,
) -> Result<(), FibermapError> {
    conn.execute(
        "INSERT INTO audit_log(event_id, ts, action_type, description) VALUES(?1, ?2, ?3, ?4)",
        params![
            time::new_event_id(),
            time::now_epoch_z(),
            action_type,
            description
        ],
    )?;
    Ok(())
}

/// Most recent audit entries first.
pub fn recent_audit(conn: &Connection, limit: usize) -> Result<Vec<AuditEntry>, FibermapError> {
    let mut stmt = conn.prepare(
        "SELECT id, event_id, ts, action_type, description FROM audit_log
         ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(AuditEntry {
            id: row.get(0)?,
            event_id: row.get(1)?,
            ts: row.get(2)?,
            action_type: row.get(3)?,
            description: row.get(4)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
