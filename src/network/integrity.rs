//! Capacity & Integrity Enforcer.
//!
//! Every hierarchy or capacity mutation goes through here. Each public
//! operation is one `DbBroker::with_write` transaction: preconditions are
//! checked against the same snapshot the write lands in, and any violation
//! rolls the whole mutation back.
//!
//! `used_ports` is never trusted as an input. After any change to a
//! splitter's attachments it is recomputed from the live customer count in
//! the same transaction, and the table's CHECK constraint bounds it by
//! `port_capacity`.

use crate::core::error::FibermapError;
use crate::core::store::Store;
use crate::core::time;
use crate::network::model::{
    Asset, AssetStatus, AssetUpdate, Customer, CustomerUpdate, EntityId, Fdh, FdhUpdate, Headend,
    NewAsset, NewCustomer, NewFdh, NewHeadend, NewSplitter, Splitter, SplitterUpdate,
};
use crate::network::store;
use rusqlite::{Connection, params};

fn require_text(field: &str, value: &str) -> Result<(), FibermapError> {
    if value.trim().is_empty() {
        return Err(FibermapError::ValidationError(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

fn check_fdh_room(
    conn: &Connection,
    fdh: &Fdh,
    excluding_splitter: Option<EntityId>,
    port_capacity: u32,
) -> Result<(), FibermapError> {
    let aggregate = store::aggregate_capacity(conn, fdh.id, excluding_splitter)?;
    let total = u64::from(aggregate) + u64::from(port_capacity);
    if total > u64::from(fdh.max_ports) {
        return Err(FibermapError::CapacityExceeded(format!(
            "FDH {} has {} of {} ports allocated to splitters; adding {} would make {}",
            fdh.id, aggregate, fdh.max_ports, port_capacity, total
        )));
    }
    Ok(())
}

/// Recompute `used_ports` from the attached customer count.
fn recompute_used_ports(conn: &Connection, splitter_id: EntityId) -> Result<u32, FibermapError> {
    conn.execute(
        "UPDATE splitters
         SET used_ports = (SELECT COUNT(*) FROM customers WHERE splitter_id = ?1)
         WHERE id = ?1",
        params![splitter_id],
    )?;
    store::attached_customer_count(conn, splitter_id)
}

fn describe_changes(changes: &[(&str, String)]) -> String {
    changes
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

// --- Headends ---

pub fn create_headend(store: &Store, new: &NewHeadend) -> Result<Headend, FibermapError> {
    store
        .broker()
        .with_write("headend.create", |conn| create_headend_in(conn, new))
}

pub(crate) fn create_headend_in(
    conn: &Connection,
    new: &NewHeadend,
) -> Result<Headend, FibermapError> {
    require_text("name", &new.name)?;
    let headend = store::insert_headend(conn, new)?;
    store::insert_audit(
        conn,
        "Headend Create",
        &format!("Created headend {} (ID: {})", headend.name, headend.id),
    )?;
    Ok(headend)
}

pub fn delete_headend(store: &Store, id: EntityId) -> Result<(), FibermapError> {
    store.broker().with_write("headend.delete", |conn| {
        store::delete::<Headend>(conn, id)?;
        store::insert_audit(conn, "Headend Delete", &format!("Deleted headend {}", id))
    })
}

// --- FDHs ---

pub fn create_fdh(store: &Store, new: &NewFdh) -> Result<Fdh, FibermapError> {
    store
        .broker()
        .with_write("fdh.create", |conn| create_fdh_in(conn, new))
}

pub(crate) fn create_fdh_in(conn: &Connection, new: &NewFdh) -> Result<Fdh, FibermapError> {
    require_text("name", &new.name)?;
    if new.max_ports == 0 {
        return Err(FibermapError::ValidationError(
            "max_ports must be at least 1".to_string(),
        ));
    }
    if !store::exists::<Headend>(conn, new.headend_id)? {
        return Err(FibermapError::NotFound(format!(
            "Headend {} not found",
            new.headend_id
        )));
    }
    let fdh = store::insert_fdh(conn, new)?;
    store::insert_audit(
        conn,
        "FDH Create",
        &format!(
            "Created FDH {} (ID: {}) under headend {} with {} ports",
            fdh.name, fdh.id, fdh.headend_id, fdh.max_ports
        ),
    )?;
    Ok(fdh)
}

pub fn update_fdh(store: &Store, id: EntityId, update: &FdhUpdate) -> Result<Fdh, FibermapError> {
    store.broker().with_write("fdh.update", |conn| {
        let mut fdh = store::get::<Fdh>(conn, id)?;
        let mut changes = Vec::new();

        if let Some(name) = &update.name {
            require_text("name", name)?;
            fdh.name = name.clone();
            changes.push(("name", name.clone()));
        }
        if let Some(location) = &update.location {
            fdh.location = location.clone();
            changes.push(("location", location.clone()));
        }
        if let Some(region) = &update.region {
            fdh.region = Some(region.clone());
            changes.push(("region", region.clone()));
        }
        if let Some(max_ports) = update.max_ports {
            if max_ports == 0 {
                return Err(FibermapError::ValidationError(
                    "max_ports must be at least 1".to_string(),
                ));
            }
            let allocated = store::aggregate_capacity(conn, id, None)?;
            if max_ports < allocated {
                return Err(FibermapError::CapacityExceeded(format!(
                    "FDH {} already allocates {} ports to splitters; max_ports cannot drop to {}",
                    id, allocated, max_ports
                )));
            }
            fdh.max_ports = max_ports;
            changes.push(("max_ports", max_ports.to_string()));
        }

        let fdh = store::update_fdh_row(conn, &fdh)?;
        store::insert_audit(
            conn,
            "FDH Update",
            &format!(
                "Updated FDH {}. Changes: {}",
                fdh.name,
                describe_changes(&changes)
            ),
        )?;
        Ok(fdh)
    })
}

pub fn delete_fdh(store: &Store, id: EntityId) -> Result<(), FibermapError> {
    store.broker().with_write("fdh.delete", |conn| {
        store::delete::<Fdh>(conn, id)?;
        store::insert_audit(conn, "FDH Delete", &format!("Deleted FDH {}", id))
    })
}

// --- Splitters ---

pub fn create_splitter(store: &Store, new: &NewSplitter) -> Result<Splitter, FibermapError> {
    store
        .broker()
        .with_write("splitter.create", |conn| create_splitter_in(conn, new))
}

pub(crate) fn create_splitter_in(
    conn: &Connection,
    new: &NewSplitter,
) -> Result<Splitter, FibermapError> {
    require_text("model", &new.model)?;
    if new.port_capacity == 0 {
        return Err(FibermapError::ValidationError(
            "port_capacity must be at least 1".to_string(),
        ));
    }
    let fdh = store::get::<Fdh>(conn, new.fdh_id)?;
    check_fdh_room(conn, &fdh, None, new.port_capacity)?;
    let splitter = store::insert_splitter(conn, new)?;
    store::insert_audit(
        conn,
        "Splitter Create",
        &format!(
            "Created splitter {} ({}) in FDH {} with {} ports",
            splitter.id, splitter.model, splitter.fdh_id, splitter.port_capacity
        ),
    )?;
    Ok(splitter)
}

/// Update a splitter's model/location/capacity or move it to another FDH.
///
/// A move is refused with `NotEmpty` while any customer is attached, before
/// the target FDH is even looked at.
pub fn update_splitter(
    store: &Store,
    id: EntityId,
    update: &SplitterUpdate,
) -> Result<Splitter, FibermapError> {
    store.broker().with_write("splitter.update", |conn| {
        let current = store::get::<Splitter>(conn, id)?;
        let used = store::attached_customer_count(conn, id)?;
        let mut next = current.clone();
        let mut changes = Vec::new();

        let target_fdh_id = update.fdh_id.unwrap_or(current.fdh_id);
        let moving = target_fdh_id != current.fdh_id;
        if moving && used > 0 {
            return Err(FibermapError::NotEmpty(format!(
                "Cannot move splitter {} while {} customer(s) are attached. Reassign customers first.",
                id, used
            )));
        }

        if let Some(model) = &update.model {
            require_text("model", model)?;
            next.model = model.clone();
            changes.push(("model", model.clone()));
        }
        if let Some(location) = &update.location {
            next.location = location.clone();
            changes.push(("location", location.clone()));
        }
        if let Some(port_capacity) = update.port_capacity {
            if port_capacity == 0 {
                return Err(FibermapError::ValidationError(
                    "port_capacity must be at least 1".to_string(),
                ));
            }
            if port_capacity < used {
                return Err(FibermapError::CapacityExceeded(format!(
                    "Splitter {} has {} customers attached; port_capacity cannot drop to {}",
                    id, used, port_capacity
                )));
            }
            if let Some(&highest) = store::occupied_ports(conn, id)?.last()
                && highest > port_capacity
            {
                return Err(FibermapError::CapacityExceeded(format!(
                    "Splitter {} has a customer on port {}; port_capacity cannot drop to {}",
                    id, highest, port_capacity
                )));
            }
            next.port_capacity = port_capacity;
            changes.push(("port_capacity", port_capacity.to_string()));
        }

        if moving || next.port_capacity != current.port_capacity {
            let target = store::get::<Fdh>(conn, target_fdh_id)?;
            check_fdh_room(conn, &target, Some(id), next.port_capacity)?;
        }
        if moving {
            next.fdh_id = target_fdh_id;
            changes.push(("fdh_id", target_fdh_id.to_string()));
        }

        store::update_splitter_row(conn, &next)?;
        recompute_used_ports(conn, id)?;
        store::insert_audit(
            conn,
            "Splitter Update",
            &format!(
                "Updated Splitter {}. Changes: {}",
                id,
                describe_changes(&changes)
            ),
        )?;
        store::get::<Splitter>(conn, id)
    })
}

pub fn delete_splitter(store: &Store, id: EntityId) -> Result<(), FibermapError> {
    store.broker().with_write("splitter.delete", |conn| {
        store::delete::<Splitter>(conn, id)?;
        store::insert_audit(conn, "Splitter Delete", &format!("Deleted splitter {}", id))
    })
}

// --- Customers ---

pub fn create_customer(store: &Store, new: &NewCustomer) -> Result<Customer, FibermapError> {
    store
        .broker()
        .with_write("customer.create", |conn| create_customer_in(conn, new))
}

pub(crate) fn create_customer_in(
    conn: &Connection,
    new: &NewCustomer,
) -> Result<Customer, FibermapError> {
    require_text("name", &new.name)?;
    let customer = store::insert_customer(conn, new)?;
    store::insert_audit(
        conn,
        "Customer Create",
        &format!("Created customer {} (ID: {})", customer.name, customer.id),
    )?;
    Ok(customer)
}

pub fn update_customer(
    store: &Store,
    id: EntityId,
    update: &CustomerUpdate,
) -> Result<Customer, FibermapError> {
    store.broker().with_write("customer.update", |conn| {
        let mut customer = store::get::<Customer>(conn, id)?;
        let mut changes = Vec::new();

        if let Some(name) = &update.name {
            require_text("name", name)?;
            customer.name = name.clone();
            changes.push(("name", name.clone()));
        }
        if let Some(address) = &update.address {
            customer.address = address.clone();
            changes.push(("address", address.clone()));
        }
        if let Some(neighborhood) = &update.neighborhood {
            customer.neighborhood = Some(neighborhood.clone());
            changes.push(("neighborhood", neighborhood.clone()));
        }
        if let Some(plan) = &update.plan {
            customer.plan = Some(plan.clone());
            changes.push(("plan", plan.clone()));
        }
        if let Some(connection_type) = update.connection_type {
            customer.connection_type = connection_type;
            changes.push(("connection_type", connection_type.to_string()));
        }
        if let Some(status) = update.status {
            customer.status = status;
            changes.push(("status", status.to_string()));
        }

        let customer = store::update_customer_row(conn, &customer)?;
        store::insert_audit(
            conn,
            "Customer Update",
            &format!(
                "Updated customer {}. Changes: {}",
                customer.id,
                describe_changes(&changes)
            ),
        )?;
        Ok(customer)
    })
}

/// Attach a customer to a splitter port.
///
/// Without an explicit `port` the lowest free port is taken. A customer
/// already on another splitter is moved in the same transaction.
pub fn attach_customer(
    store: &Store,
    customer_id: EntityId,
    splitter_id: EntityId,
    port: Option<u32>,
) -> Result<Customer, FibermapError> {
    store.broker().with_write("customer.attach", |conn| {
        attach_customer_in(conn, customer_id, splitter_id, port)
    })
}

pub(crate) fn attach_customer_in(
    conn: &Connection,
    customer_id: EntityId,
    splitter_id: EntityId,
    port: Option<u32>,
) -> Result<Customer, FibermapError> {
    let mut customer = store::get::<Customer>(conn, customer_id)?;
    let splitter = store::get::<Splitter>(conn, splitter_id)?;
    let previous = customer.splitter_id;
    let same_splitter = previous == Some(splitter_id);

    if same_splitter && (port.is_none() || port == customer.assigned_port) {
        return Ok(customer);
    }

    let used = store::attached_customer_count(conn, splitter_id)?;
    if !same_splitter && used >= splitter.port_capacity {
        return Err(FibermapError::CapacityExceeded(format!(
            "Splitter {} is full ({} of {} ports used)",
            splitter_id, used, splitter.port_capacity
        )));
    }

    let occupied = store::occupied_ports(conn, splitter_id)?;
    let chosen = match port {
        Some(p) => {
            if p == 0 || p > splitter.port_capacity {
                return Err(FibermapError::ValidationError(format!(
                    "Port {} is outside 1..={} on splitter {}",
                    p, splitter.port_capacity, splitter_id
                )));
            }
            if occupied.contains(&p) {
                return Err(FibermapError::Conflict(format!(
                    "Port {} on splitter {} is already taken",
                    p, splitter_id
                )));
            }
            p
        }
        None => (1..=splitter.port_capacity)
            .find(|p| !occupied.contains(p))
            .ok_or_else(|| {
                FibermapError::CapacityExceeded(format!(
                    "Splitter {} has no free port",
                    splitter_id
                ))
            })?,
    };

    customer.splitter_id = Some(splitter_id);
    customer.assigned_port = Some(chosen);
    let customer = store::update_customer_row(conn, &customer)?;

    recompute_used_ports(conn, splitter_id)?;
    if let Some(old) = previous
        && old != splitter_id
    {
        recompute_used_ports(conn, old)?;
    }

    store::insert_audit(
        conn,
        "Customer Attach",
        &format!(
            "Attached customer {} to splitter {} port {}",
            customer_id, splitter_id, chosen
        ),
    )?;
    Ok(customer)
}

/// Detach a customer from its splitter. Always permitted; a no-op when unattached.
pub fn detach_customer(store: &Store, customer_id: EntityId) -> Result<Customer, FibermapError> {
    store.broker().with_write("customer.detach", |conn| {
        let mut customer = store::get::<Customer>(conn, customer_id)?;
        let Some(previous) = customer.splitter_id else {
            return Ok(customer);
        };
        customer.splitter_id = None;
        customer.assigned_port = None;
        let customer = store::update_customer_row(conn, &customer)?;
        recompute_used_ports(conn, previous)?;
        store::insert_audit(
            conn,
            "Customer Detach",
            &format!(
                "Detached customer {} from splitter {}",
                customer_id, previous
            ),
        )?;
        Ok(customer)
    })
}

pub fn delete_customer(store: &Store, customer_id: EntityId) -> Result<(), FibermapError> {
    store.broker().with_write("customer.delete", |conn| {
        let customer = store::get::<Customer>(conn, customer_id)?;
        store::delete::<Customer>(conn, customer_id)?;
        if let Some(splitter_id) = customer.splitter_id {
            recompute_used_ports(conn, splitter_id)?;
        }
        store::insert_audit(
            conn,
            "Customer Delete",
            &format!("Deleted customer {} (ID: {})", customer.name, customer_id),
        )
    })
}

// --- Assets ---

pub fn create_asset(store: &Store, new: &NewAsset) -> Result<Asset, FibermapError> {
    store
        .broker()
        .with_write("asset.create", |conn| create_asset_in(conn, new))
}

pub(crate) fn create_asset_in(conn: &Connection, new: &NewAsset) -> Result<Asset, FibermapError> {
    require_text("serial_number", &new.serial_number)?;
    require_text("model", &new.model)?;
    if new.status == AssetStatus::Assigned {
        return Err(FibermapError::ValidationError(
            "A new asset cannot start as Assigned; create it, then assign it to a customer"
                .to_string(),
        ));
    }
    let mut new = new.clone();
    new.serial_number = new.serial_number.trim().to_string();
    let asset = store::insert_asset(conn, &new)?;
    store::insert_audit(
        conn,
        "Asset Create",
        &format!(
            "Created {} asset {} (ID: {})",
            asset.asset_type, asset.serial_number, asset.id
        ),
    )?;
    Ok(asset)
}

/// Update model, location or status. Serial number and type are immutable.
pub fn update_asset(
    store: &Store,
    id: EntityId,
    update: &AssetUpdate,
) -> Result<Asset, FibermapError> {
    store.broker().with_write("asset.update", |conn| {
        let mut asset = store::get::<Asset>(conn, id)?;
        let mut changes = Vec::new();

        if let Some(serial) = &update.serial_number
            && serial.trim() != asset.serial_number
        {
            return Err(FibermapError::ValidationError(format!(
                "serial_number of asset {} is immutable",
                id
            )));
        }
        if let Some(asset_type) = update.asset_type
            && asset_type != asset.asset_type
        {
            return Err(FibermapError::ValidationError(format!(
                "asset_type of asset {} is immutable",
                id
            )));
        }

        if let Some(model) = &update.model {
            require_text("model", model)?;
            asset.model = model.clone();
            changes.push(("model", model.clone()));
        }
        if let Some(location) = &update.location {
            asset.location = Some(location.clone());
            changes.push(("location", location.clone()));
        }
        if let Some(status) = update.status {
            apply_asset_status(&mut asset, status)?;
            changes.push(("status", status.to_string()));
        }

        let asset = store::update_asset_row(conn, &asset)?;
        store::insert_audit(
            conn,
            "Asset Update",
            &format!(
                "Updated asset {}. Changes: {}",
                asset.serial_number,
                describe_changes(&changes)
            ),
        )?;
        Ok(asset)
    })
}

/// Status transitions that keep "Assigned implies linked" true.
fn apply_asset_status(asset: &mut Asset, status: AssetStatus) -> Result<(), FibermapError> {
    let linked = asset.assigned_customer_id.is_some();
    match status {
        AssetStatus::Assigned if !linked => {
            return Err(FibermapError::ValidationError(format!(
                "Asset {} is not linked to a customer; assign it instead of setting status",
                asset.id
            )));
        }
        AssetStatus::Available if linked => {
            return Err(FibermapError::ValidationError(format!(
                "Asset {} is linked to customer {}; unassign it first",
                asset.id,
                asset.assigned_customer_id.unwrap_or_default()
            )));
        }
        AssetStatus::Retired => {
            asset.assigned_customer_id = None;
            asset.assigned_on = None;
        }
        _ => {}
    }
    asset.status = status;
    Ok(())
}

pub fn assign_asset(
    store: &Store,
    asset_id: EntityId,
    customer_id: EntityId,
) -> Result<Asset, FibermapError> {
    store.broker().with_write("asset.assign", |conn| {
        assign_asset_in(conn, asset_id, customer_id)
    })
}

pub(crate) fn assign_asset_in(
    conn: &Connection,
    asset_id: EntityId,
    customer_id: EntityId,
) -> Result<Asset, FibermapError> {
    let mut asset = store::get::<Asset>(conn, asset_id)?;
    if !store::exists::<Customer>(conn, customer_id)? {
        return Err(FibermapError::NotFound(format!(
            "Customer {} not found",
            customer_id
        )));
    }
    match asset.assigned_customer_id {
        Some(owner) if owner == customer_id => return Ok(asset),
        Some(owner) => {
            return Err(FibermapError::Conflict(format!(
                "Asset {} is already assigned to customer {}",
                asset.serial_number, owner
            )));
        }
        None => {}
    }
    if matches!(asset.status, AssetStatus::Faulty | AssetStatus::Retired) {
        return Err(FibermapError::ValidationError(format!(
            "Asset {} is {} and cannot be assigned",
            asset.serial_number, asset.status
        )));
    }

    asset.assigned_customer_id = Some(customer_id);
    asset.assigned_on = Some(time::now_epoch_z());
    asset.status = AssetStatus::Assigned;
    let asset = store::update_asset_row(conn, &asset)?;
    store::insert_audit(
        conn,
        "Asset Assign",
        &format!(
            "Assigned asset {} to customer {}",
            asset.serial_number, customer_id
        ),
    )?;
    Ok(asset)
}

/// Unlink an asset from its customer. Always permitted.
pub fn unassign_asset(store: &Store, asset_id: EntityId) -> Result<Asset, FibermapError> {
    store.broker().with_write("asset.unassign", |conn| {
        let mut asset = store::get::<Asset>(conn, asset_id)?;
        let Some(owner) = asset.assigned_customer_id else {
            return Ok(asset);
        };
        asset.assigned_customer_id = None;
        asset.assigned_on = None;
        if asset.status == AssetStatus::Assigned {
            asset.status = AssetStatus::Available;
        }
        let asset = store::update_asset_row(conn, &asset)?;
        store::insert_audit(
            conn,
            "Asset Unassign",
            &format!(
                "Unassigned asset {} from customer {}",
                asset.serial_number, owner
            ),
        )?;
        Ok(asset)
    })
}

/// Soft delete: unlink and mark Retired.
pub fn retire_asset(store: &Store, asset_id: EntityId) -> Result<Asset, FibermapError> {
    store.broker().with_write("asset.retire", |conn| {
        let mut asset = store::get::<Asset>(conn, asset_id)?;
        apply_asset_status(&mut asset, AssetStatus::Retired)?;
        let asset = store::update_asset_row(conn, &asset)?;
        store::insert_audit(
            conn,
            "Asset Retired",
            &format!("Retired asset {} (ID: {})", asset.serial_number, asset_id),
        )?;
        Ok(asset)
    })
}
