//! Demo network loaded by `fibermap seed`.

use crate::core::error::FibermapError;
use crate::core::store::Store;
use crate::network::integrity;
use crate::network::model::{
    AssetStatus, AssetType, ConnectionType, CustomerStatus, NewAsset, NewCustomer, NewFdh,
    NewHeadend, NewSplitter,
};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub seeded: bool,
    pub headends: usize,
    pub fdhs: usize,
    pub splitters: usize,
    pub assets: usize,
    pub customers: usize,
}

fn is_empty(conn: &Connection) -> Result<bool, FibermapError> {
    let rows: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM headends)
              + (SELECT COUNT(*) FROM customers)
              + (SELECT COUNT(*) FROM assets)",
        [],
        |row| row.get(0),
    )?;
    Ok(rows == 0)
}

/// Load the demo network. A store that already holds data is left untouched.
pub fn seed(store: &Store) -> Result<SeedReport, FibermapError> {
    store.broker().with_write("seed", |conn| {
        if !is_empty(conn)? {
            return Ok(SeedReport::default());
        }

        let headend = integrity::create_headend_in(
            conn,
            &NewHeadend {
                name: "Main Headend".to_string(),
                location: "123 Core St".to_string(),
            },
        )?;
        let fdh = integrity::create_fdh_in(
            conn,
            &NewFdh {
                name: "FDH-01-North".to_string(),
                location: "Corner of 1st and Main".to_string(),
                region: Some("North".to_string()),
                max_ports: 128,
                headend_id: headend.id,
            },
        )?;
        for (model, ports, location) in [("1:32", 32, "Slot 1, Shelf 1"), ("1:16", 16, "Slot 2, Shelf 1")] {
            integrity::create_splitter_in(
                conn,
                &NewSplitter {
                    model: model.to_string(),
                    port_capacity: ports,
                    location: location.to_string(),
                    fdh_id: fdh.id,
                },
            )?;
        }
        for (asset_type, model, serial) in [
            (AssetType::Ont, "Nokia G-010G-A", "NK123456"),
            (AssetType::Router, "Netgear R7000", "NG789012"),
        ] {
            integrity::create_asset_in(
                conn,
                &NewAsset {
                    asset_type,
                    model: model.to_string(),
                    serial_number: serial.to_string(),
                    location: Some("Warehouse A".to_string()),
                    status: AssetStatus::Available,
                },
            )?;
        }
        integrity::create_customer_in(
            conn,
            &NewCustomer {
                name: "Alice Smith".to_string(),
                address: "456 Oak St".to_string(),
                neighborhood: Some("North".to_string()),
                plan: Some("1 GIG Fiber".to_string()),
                connection_type: ConnectionType::Wired,
                status: CustomerStatus::Pending,
            },
        )?;

        Ok(SeedReport {
            seeded: true,
            headends: 1,
            fdhs: 1,
            splitters: 2,
            assets: 2,
            customers: 1,
        })
    })
}
