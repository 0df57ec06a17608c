//! Query Resolver: maps an anchor selector to the record a topology walk starts from.

use crate::core::error::FibermapError;
use crate::network::model::{Asset, Customer, EntityId, Fdh};
use crate::network::store;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Anchor selectors. Exactly one must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyQuery {
    #[serde(default)]
    pub customer_id: Option<EntityId>,
    #[serde(default)]
    pub fdh_id: Option<EntityId>,
    #[serde(default, alias = "serial")]
    pub asset_serial: Option<String>,
}

impl TopologyQuery {
    pub fn customer(id: EntityId) -> Self {
        Self {
            customer_id: Some(id),
            ..Self::default()
        }
    }

    pub fn fdh(id: EntityId) -> Self {
        Self {
            fdh_id: Some(id),
            ..Self::default()
        }
    }

    pub fn serial(serial: &str) -> Self {
        Self {
            asset_serial: Some(serial.to_string()),
            ..Self::default()
        }
    }

    fn serial_selector(&self) -> Option<&str> {
        self.asset_serial
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Names of the selectors present, in resolution order.
    pub fn selectors(&self) -> Vec<&'static str> {
        let mut present = Vec::new();
        if self.customer_id.is_some() {
            present.push("customer_id");
        }
        if self.fdh_id.is_some() {
            present.push("fdh_id");
        }
        if self.serial_selector().is_some() {
            present.push("asset_serial");
        }
        present
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    Customer(Customer),
    Fdh(Fdh),
    Asset(Asset),
}

/// Resolve the single selector in `query` to its record.
///
/// Zero selectors and more than one selector are both `InvalidQuery`.
pub fn resolve(conn: &Connection, query: &TopologyQuery) -> Result<Anchor, FibermapError> {
    let present = query.selectors();
    match present.len() {
        0 => {
            return Err(FibermapError::InvalidQuery(
                "A customer_id, fdh_id, or asset serial number is required".to_string(),
            ));
        }
        1 => {}
        _ => {
            return Err(FibermapError::InvalidQuery(format!(
                "Exactly one anchor selector is allowed, got: {}",
                present.join(", ")
            )));
        }
    }

    if let Some(id) = query.customer_id {
        return Ok(Anchor::Customer(store::get::<Customer>(conn, id)?));
    }
    if let Some(id) = query.fdh_id {
        return Ok(Anchor::Fdh(store::get::<Fdh>(conn, id)?));
    }
    let serial = query.serial_selector().unwrap_or_default();
    store::find_asset_by_serial(conn, serial)?
        .map(Anchor::Asset)
        .ok_or_else(|| {
            FibermapError::NotFound(format!(
                "Asset with serial number '{}' not found",
                serial
            ))
        })
}
