use fibermap::core::config::Config;
use fibermap::core::error::ErrorKind;
use fibermap::core::store::Store;
use fibermap::network::integrity::*;
use fibermap::network::model::{
    AssetStatus, AssetType, AssetUpdate, Customer, CustomerStatus, CustomerUpdate, EntityId, Fdh,
    FdhUpdate, NewAsset, NewCustomer, NewFdh, NewHeadend, NewSplitter, Splitter, SplitterUpdate,
};
use fibermap::network::store;
use tempfile::tempdir;

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::with_config(tmp.path().to_path_buf(), Config::default()).unwrap();
    (tmp, store)
}

fn headend(store: &Store, name: &str) -> EntityId {
    create_headend(
        store,
        &NewHeadend {
            name: name.to_string(),
            location: "123 Core St".to_string(),
        },
    )
    .unwrap()
    .id
}

fn fdh(store: &Store, headend_id: EntityId, name: &str, max_ports: u32) -> Fdh {
    create_fdh(
        store,
        &NewFdh {
            name: name.to_string(),
            location: "Corner of 1st and Main".to_string(),
            region: Some("North".to_string()),
            max_ports,
            headend_id,
        },
    )
    .unwrap()
}

fn new_splitter(fdh_id: EntityId, port_capacity: u32) -> NewSplitter {
    NewSplitter {
        model: format!("1:{}", port_capacity),
        port_capacity,
        location: "Slot 1, Shelf 1".to_string(),
        fdh_id,
    }
}

fn customer(store: &Store, name: &str) -> Customer {
    create_customer(
        store,
        &NewCustomer {
            name: name.to_string(),
            address: "456 Oak St".to_string(),
            neighborhood: Some("North".to_string()),
            plan: Some("1 GIG Fiber".to_string()),
            connection_type: Default::default(),
            status: CustomerStatus::Pending,
        },
    )
    .unwrap()
}

fn asset(store: &Store, serial: &str) -> fibermap::network::model::Asset {
    create_asset(
        store,
        &NewAsset {
            asset_type: AssetType::Ont,
            model: "Nokia G-010G-A".to_string(),
            serial_number: serial.to_string(),
            location: Some("Warehouse A".to_string()),
            status: AssetStatus::Available,
        },
    )
    .unwrap()
}

fn reload_splitter(store: &Store, id: EntityId) -> Splitter {
    store
        .broker()
        .with_read("test.splitter", |conn| store::get::<Splitter>(conn, id))
        .unwrap()
}

fn audit_actions(store: &Store) -> Vec<String> {
    store
        .broker()
        .with_read("test.audit", |conn| store::recent_audit(conn, 100))
        .unwrap()
        .into_iter()
        .map(|e| e.action_type)
        .collect()
}

#[test]
fn test_thirty_two_customers_fill_a_splitter() {
    let (_tmp, store) = test_store();
    let he = headend(&store, "Main Headend");
    let f = fdh(&store, he, "FDH-01-North", 128);
    let splitter = create_splitter(&store, &new_splitter(f.id, 32)).unwrap();

    let mut customers = Vec::new();
    for i in 0..32 {
        let c = customer(&store, &format!("Customer {}", i));
        let attached = attach_customer(&store, c.id, splitter.id, None).unwrap();
        assert_eq!(attached.assigned_port, Some(i + 1));
        customers.push(c);
    }
    assert_eq!(reload_splitter(&store, splitter.id).used_ports, 32);

    let extra = customer(&store, "Customer 33");
    let err = attach_customer(&store, extra.id, splitter.id, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    assert_eq!(reload_splitter(&store, splitter.id).used_ports, 32);

    let detached = detach_customer(&store, customers[4].id).unwrap();
    assert_eq!(detached.splitter_id, None);
    assert_eq!(detached.assigned_port, None);
    assert_eq!(reload_splitter(&store, splitter.id).used_ports, 31);

    // The freed port (5) is the lowest one available again.
    let reattached = attach_customer(&store, extra.id, splitter.id, None).unwrap();
    assert_eq!(reattached.assigned_port, Some(5));
    let full = reload_splitter(&store, splitter.id);
    assert_eq!(full.used_ports, 32);
    assert!(full.is_full());
}

#[test]
fn test_fdh_aggregate_capacity() {
    let (_tmp, store) = test_store();
    let he = headend(&store, "HE");
    let f = fdh(&store, he, "FDH-64", 64);
    create_splitter(&store, &new_splitter(f.id, 32)).unwrap();

    let err = create_splitter(&store, &new_splitter(f.id, 40)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);

    let b = create_splitter(&store, &new_splitter(f.id, 32)).unwrap();
    assert_eq!(b.port_capacity, 32);

    // Full to the port; even one more is refused.
    let err = create_splitter(&store, &new_splitter(f.id, 1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
}

#[test]
fn test_splitter_under_missing_fdh_is_not_found() {
    let (_tmp, store) = test_store();
    let err = create_splitter(&store, &new_splitter(99, 8)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = create_fdh(
        &store,
        &NewFdh {
            name: "Orphan".to_string(),
            location: String::new(),
            region: None,
            max_ports: 8,
            headend_id: 7,
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_zero_capacity_is_rejected() {
    let (_tmp, store) = test_store();
    let he = headend(&store, "HE");
    let f = fdh(&store, he, "FDH", 16);
    let err = create_splitter(&store, &new_splitter(f.id, 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_reparent_with_customers_is_not_empty() {
    let (_tmp, store) = test_store();
    let he = headend(&store, "HE");
    let a = fdh(&store, he, "FDH-A", 64);
    let b = fdh(&store, he, "FDH-B", 512);
    let splitter = create_splitter(&store, &new_splitter(a.id, 16)).unwrap();
    let c = customer(&store, "Alice Smith");
    attach_customer(&store, c.id, splitter.id, None).unwrap();

    // Target has plenty of room; the move is still refused.
    let err = update_splitter(
        &store,
        splitter.id,
        &SplitterUpdate {
            fdh_id: Some(b.id),
            location: Some("Slot 9".to_string()),
            ..SplitterUpdate::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotEmpty);
    let unchanged = reload_splitter(&store, splitter.id);
    assert_eq!(unchanged.fdh_id, a.id);
    assert_eq!(unchanged.location, "Slot 1, Shelf 1");

    // Same FDH is not a move.
    let same = update_splitter(
        &store,
        splitter.id,
        &SplitterUpdate {
            fdh_id: Some(a.id),
            location: Some("Slot 2".to_string()),
            ..SplitterUpdate::default()
        },
    )
    .unwrap();
    assert_eq!(same.location, "Slot 2");

    detach_customer(&store, c.id).unwrap();
    let moved = update_splitter(
        &store,
        splitter.id,
        &SplitterUpdate {
            fdh_id: Some(b.id),
            ..SplitterUpdate::default()
        },
    )
    .unwrap();
    assert_eq!(moved.fdh_id, b.id);
    assert_eq!(moved.used_ports, 0);
}

#[test]
fn test_empty_splitter_move_checks_target_room() {
    let (_tmp, store) = test_store();
    let he = headend(&store, "HE");
    let a = fdh(&store, he, "FDH-A", 64);
    let small = fdh(&store, he, "FDH-Small", 16);
    let splitter = create_splitter(&store, &new_splitter(a.id, 32)).unwrap();

    let err = update_splitter(
        &store,
        splitter.id,
        &SplitterUpdate {
            fdh_id: Some(small.id),
            ..SplitterUpdate::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
}

#[test]
fn test_capacity_changes_respect_used_ports_and_fdh() {
    let (_tmp, store) = test_store();
    let he = headend(&store, "HE");
    let f = fdh(&store, he, "FDH", 48);
    let splitter = create_splitter(&store, &new_splitter(f.id, 16)).unwrap();
    create_splitter(&store, &new_splitter(f.id, 16)).unwrap();
    for i in 0..4 {
        let c = customer(&store, &format!("C{}", i));
        attach_customer(&store, c.id, splitter.id, None).unwrap();
    }

    let shrink = |cap| {
        update_splitter(
            &store,
            splitter.id,
            &SplitterUpdate {
                port_capacity: Some(cap),
                ..SplitterUpdate::default()
            },
        )
    };
    assert_eq!(shrink(3).unwrap_err().kind(), ErrorKind::CapacityExceeded);
    assert_eq!(shrink(4).unwrap().port_capacity, 4);
    // 4 -> 33 would make 33 + 16 = 49 > 48.
    assert_eq!(shrink(33).unwrap_err().kind(), ErrorKind::CapacityExceeded);
    assert_eq!(shrink(32).unwrap().port_capacity, 32);

    let err = update_fdh(
        &store,
        f.id,
        &FdhUpdate {
            max_ports: Some(40),
            ..FdhUpdate::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    let updated = update_fdh(
        &store,
        f.id,
        &FdhUpdate {
            max_ports: Some(48),
            region: Some("South".to_string()),
            ..FdhUpdate::default()
        },
    )
    .unwrap();
    assert_eq!(updated.region.as_deref(), Some("South"));
}

#[test]
fn test_capacity_cannot_drop_below_highest_occupied_port() {
    let (_tmp, store) = test_store();
    let he = headend(&store, "HE");
    let f = fdh(&store, he, "FDH", 64);
    let splitter = create_splitter(&store, &new_splitter(f.id, 32)).unwrap();
    let c = customer(&store, "Alice Smith");
    attach_customer(&store, c.id, splitter.id, Some(30)).unwrap();

    let shrink = |cap| {
        update_splitter(
            &store,
            splitter.id,
            &SplitterUpdate {
                port_capacity: Some(cap),
                ..SplitterUpdate::default()
            },
        )
    };
    // One customer fits in 16 ports, but it sits on port 30.
    assert_eq!(shrink(16).unwrap_err().kind(), ErrorKind::CapacityExceeded);
    assert_eq!(shrink(29).unwrap_err().kind(), ErrorKind::CapacityExceeded);
    assert_eq!(reload_splitter(&store, splitter.id).port_capacity, 32);

    assert_eq!(shrink(30).unwrap().port_capacity, 30);
    let attached = store
        .broker()
        .with_read("test.customer", |conn| store::get::<Customer>(conn, c.id))
        .unwrap();
    assert_eq!(attached.assigned_port, Some(30));
}

#[test]
fn test_delete_bottom_up_only() {
    let (_tmp, store) = test_store();
    let he = headend(&store, "HE");
    let f = fdh(&store, he, "FDH", 32);
    let splitter = create_splitter(&store, &new_splitter(f.id, 8)).unwrap();
    let c = customer(&store, "Alice Smith");
    attach_customer(&store, c.id, splitter.id, None).unwrap();

    assert_eq!(delete_headend(&store, he).unwrap_err().kind(), ErrorKind::HasDependents);
    assert_eq!(delete_fdh(&store, f.id).unwrap_err().kind(), ErrorKind::HasDependents);
    assert_eq!(
        delete_splitter(&store, splitter.id).unwrap_err().kind(),
        ErrorKind::HasDependents
    );

    detach_customer(&store, c.id).unwrap();
    delete_splitter(&store, splitter.id).unwrap();
    delete_fdh(&store, f.id).unwrap();
    delete_headend(&store, he).unwrap();
    assert_eq!(delete_headend(&store, he).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_explicit_port_rules() {
    let (_tmp, store) = test_store();
    let he = headend(&store, "HE");
    let f = fdh(&store, he, "FDH", 32);
    let splitter = create_splitter(&store, &new_splitter(f.id, 8)).unwrap();
    let alice = customer(&store, "Alice");
    let bob = customer(&store, "Bob");

    let a = attach_customer(&store, alice.id, splitter.id, Some(3)).unwrap();
    assert_eq!(a.assigned_port, Some(3));

    let taken = attach_customer(&store, bob.id, splitter.id, Some(3)).unwrap_err();
    assert_eq!(taken.kind(), ErrorKind::Conflict);
    let out_of_range = attach_customer(&store, bob.id, splitter.id, Some(9)).unwrap_err();
    assert_eq!(out_of_range.kind(), ErrorKind::Validation);

    let b = attach_customer(&store, bob.id, splitter.id, None).unwrap();
    assert_eq!(b.assigned_port, Some(1));

    // Re-attaching to the same splitter without a port change is a no-op.
    let again = attach_customer(&store, alice.id, splitter.id, None).unwrap();
    assert_eq!(again.assigned_port, Some(3));
    assert_eq!(reload_splitter(&store, splitter.id).used_ports, 2);
}

#[test]
fn test_attach_moves_between_splitters() {
    let (_tmp, store) = test_store();
    let he = headend(&store, "HE");
    let f = fdh(&store, he, "FDH", 64);
    let s1 = create_splitter(&store, &new_splitter(f.id, 16)).unwrap();
    let s2 = create_splitter(&store, &new_splitter(f.id, 16)).unwrap();
    let c = customer(&store, "Alice");

    attach_customer(&store, c.id, s1.id, None).unwrap();
    let moved = attach_customer(&store, c.id, s2.id, None).unwrap();
    assert_eq!(moved.splitter_id, Some(s2.id));
    assert_eq!(reload_splitter(&store, s1.id).used_ports, 0);
    assert_eq!(reload_splitter(&store, s2.id).used_ports, 1);
}

#[test]
fn test_attach_to_missing_splitter_is_not_found() {
    let (_tmp, store) = test_store();
    let c = customer(&store, "Alice");
    let err = attach_customer(&store, c.id, 404, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    // Detaching an unattached customer is always fine.
    detach_customer(&store, c.id).unwrap();
}

#[test]
fn test_customer_with_assets_cannot_be_deleted() {
    let (_tmp, store) = test_store();
    let he = headend(&store, "HE");
    let f = fdh(&store, he, "FDH", 16);
    let splitter = create_splitter(&store, &new_splitter(f.id, 16)).unwrap();
    let c = customer(&store, "Alice");
    attach_customer(&store, c.id, splitter.id, None).unwrap();
    let ont = asset(&store, "NK123456");
    assign_asset(&store, ont.id, c.id).unwrap();

    assert_eq!(
        delete_customer(&store, c.id).unwrap_err().kind(),
        ErrorKind::HasDependents
    );
    unassign_asset(&store, ont.id).unwrap();
    delete_customer(&store, c.id).unwrap();
    assert_eq!(reload_splitter(&store, splitter.id).used_ports, 0);
}

#[test]
fn test_update_customer_fields() {
    let (_tmp, store) = test_store();
    let c = customer(&store, "Alice Smith");
    let updated = update_customer(
        &store,
        c.id,
        &CustomerUpdate {
            status: Some(CustomerStatus::Active),
            plan: Some("2 GIG Fiber".to_string()),
            ..CustomerUpdate::default()
        },
    )
    .unwrap();
    assert_eq!(updated.status, CustomerStatus::Active);
    assert_eq!(updated.plan.as_deref(), Some("2 GIG Fiber"));
    assert_eq!(updated.name, "Alice Smith");
}

#[test]
fn test_asset_lifecycle() {
    let (_tmp, store) = test_store();
    let alice = customer(&store, "Alice");
    let bob = customer(&store, "Bob");
    let ont = asset(&store, "NK123456");
    assert_eq!(ont.status, AssetStatus::Available);

    // Assigned cannot be set without a link.
    let err = update_asset(
        &store,
        ont.id,
        &AssetUpdate {
            status: Some(AssetStatus::Assigned),
            ..AssetUpdate::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let assigned = assign_asset(&store, ont.id, alice.id).unwrap();
    assert_eq!(assigned.status, AssetStatus::Assigned);
    assert_eq!(assigned.assigned_customer_id, Some(alice.id));
    assert!(assigned.assigned_on.is_some());

    let err = assign_asset(&store, ont.id, bob.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let available = unassign_asset(&store, ont.id).unwrap();
    assert_eq!(available.status, AssetStatus::Available);
    assert_eq!(available.assigned_customer_id, None);

    let faulty = update_asset(
        &store,
        ont.id,
        &AssetUpdate {
            status: Some(AssetStatus::Faulty),
            location: Some("RMA shelf".to_string()),
            ..AssetUpdate::default()
        },
    )
    .unwrap();
    assert_eq!(faulty.status, AssetStatus::Faulty);
    let err = assign_asset(&store, ont.id, bob.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let retired = retire_asset(&store, ont.id).unwrap();
    assert_eq!(retired.status, AssetStatus::Retired);
}

#[test]
fn test_asset_serial_and_type_are_immutable() {
    let (_tmp, store) = test_store();
    let ont = asset(&store, "NK123456");

    let err = update_asset(
        &store,
        ont.id,
        &AssetUpdate {
            serial_number: Some("NK000000".to_string()),
            ..AssetUpdate::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = update_asset(
        &store,
        ont.id,
        &AssetUpdate {
            asset_type: Some(AssetType::Router),
            ..AssetUpdate::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Echoing the unchanged values back is accepted.
    let same = update_asset(
        &store,
        ont.id,
        &AssetUpdate {
            serial_number: Some("NK123456".to_string()),
            asset_type: Some(AssetType::Ont),
            model: Some("Nokia G-010G-B".to_string()),
            ..AssetUpdate::default()
        },
    )
    .unwrap();
    assert_eq!(same.model, "Nokia G-010G-B");
}

#[test]
fn test_new_asset_cannot_start_assigned() {
    let (_tmp, store) = test_store();
    let err = create_asset(
        &store,
        &NewAsset {
            asset_type: AssetType::Router,
            model: "Netgear R7000".to_string(),
            serial_number: "NG789012".to_string(),
            location: None,
            status: AssetStatus::Assigned,
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_rejected_mutation_leaves_no_audit_row() {
    let (_tmp, store) = test_store();
    let he = headend(&store, "HE");
    let f = fdh(&store, he, "FDH", 8);
    let before = audit_actions(&store).len();

    create_splitter(&store, &new_splitter(f.id, 16)).unwrap_err();
    assert_eq!(audit_actions(&store).len(), before);

    create_splitter(&store, &new_splitter(f.id, 8)).unwrap();
    let actions = audit_actions(&store);
    assert_eq!(actions.len(), before + 1);
    assert_eq!(actions[0], "Splitter Create");
}
