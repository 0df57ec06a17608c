use fibermap::core::config::Config;
use fibermap::core::error::ErrorKind;
use fibermap::core::store::Store;
use fibermap::network::integrity::{
    assign_asset, create_asset, create_customer, create_fdh, create_headend, create_splitter,
};
use fibermap::network::model::{
    Asset, AssetStatus, AssetType, Customer, CustomerStatus, Headend, ListFilter, NewAsset,
    NewCustomer, NewFdh, NewHeadend, NewSplitter, Splitter,
};
use fibermap::network::store;
use tempfile::tempdir;

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::with_config(tmp.path().to_path_buf(), Config::default()).unwrap();
    (tmp, store)
}

fn new_asset(asset_type: AssetType, serial: &str, location: &str) -> NewAsset {
    NewAsset {
        asset_type,
        model: "Model X".to_string(),
        serial_number: serial.to_string(),
        location: Some(location.to_string()),
        status: AssetStatus::Available,
    }
}

fn new_customer(name: &str, status: CustomerStatus) -> NewCustomer {
    NewCustomer {
        name: name.to_string(),
        address: format!("{} Street", name),
        neighborhood: None,
        plan: None,
        connection_type: Default::default(),
        status,
    }
}

fn list_assets(store: &Store, filter: ListFilter) -> Result<Vec<Asset>, fibermap::core::error::FibermapError> {
    store
        .broker()
        .with_read("test.assets", |conn| store::list::<Asset>(conn, &filter))
}

#[test]
fn test_get_missing_record_is_not_found() {
    let (_tmp, store) = test_store();
    let err = store
        .broker()
        .with_read("test.get", |conn| store::get::<Splitter>(conn, 42))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.detail(), "Splitter 42 not found");
}

#[test]
fn test_duplicate_serial_is_conflict() {
    let (_tmp, store) = test_store();
    create_asset(&store, &new_asset(AssetType::Ont, "NK123456", "Warehouse A")).unwrap();

    let err = create_asset(&store, &new_asset(AssetType::Router, "NK123456", "Van 3")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.detail().contains("NK123456"));
    assert_eq!(list_assets(&store, ListFilter::default()).unwrap().len(), 1);
}

#[test]
fn test_duplicate_headend_name_is_conflict() {
    let (_tmp, store) = test_store();
    let he = NewHeadend {
        name: "Main Headend".to_string(),
        location: String::new(),
    };
    create_headend(&store, &he).unwrap();
    let err = create_headend(&store, &he).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_asset_filters_apply_before_paging() {
    let (_tmp, store) = test_store();
    create_asset(&store, &new_asset(AssetType::Ont, "A-1", "Warehouse A")).unwrap();
    create_asset(&store, &new_asset(AssetType::Router, "A-2", "Warehouse A")).unwrap();
    create_asset(&store, &new_asset(AssetType::Ont, "A-3", "Van 3")).unwrap();
    create_asset(&store, &new_asset(AssetType::Ont, "A-4", "warehouse B")).unwrap();

    let onts = list_assets(
        &store,
        ListFilter {
            asset_type: Some("ont".to_string()),
            ..ListFilter::default()
        },
    )
    .unwrap();
    let serials: Vec<_> = onts.iter().map(|a| a.serial_number.as_str()).collect();
    assert_eq!(serials, vec!["A-1", "A-3", "A-4"]);

    // Location is a case-insensitive substring match.
    let in_warehouses = list_assets(
        &store,
        ListFilter {
            location: Some("WAREHOUSE".to_string()),
            ..ListFilter::default()
        },
    )
    .unwrap();
    assert_eq!(in_warehouses.len(), 3);

    // Paging applies after the filter: skip the first ONT, take one.
    let page = list_assets(
        &store,
        ListFilter {
            asset_type: Some("ONT".to_string()),
            skip: Some(1),
            limit: Some(1),
            ..ListFilter::default()
        },
    )
    .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].serial_number, "A-3");

    let err = list_assets(
        &store,
        ListFilter {
            skip: Some(usize::MAX),
            ..ListFilter::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidQuery);
}

#[test]
fn test_status_filter_and_unknown_values() {
    let (_tmp, store) = test_store();
    let faulty = NewAsset {
        status: AssetStatus::Faulty,
        ..new_asset(AssetType::Cpe, "F-1", "Lab")
    };
    create_asset(&store, &faulty).unwrap();
    create_asset(&store, &new_asset(AssetType::Cpe, "F-2", "Lab")).unwrap();

    let found = list_assets(
        &store,
        ListFilter {
            status: Some("faulty".to_string()),
            ..ListFilter::default()
        },
    )
    .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].serial_number, "F-1");

    let err = list_assets(
        &store,
        ListFilter {
            status: Some("Broken".to_string()),
            ..ListFilter::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_filter_on_missing_column_is_invalid_query() {
    let (_tmp, store) = test_store();
    let err = store
        .broker()
        .with_read("test.headends", |conn| {
            store::list::<Headend>(
                conn,
                &ListFilter {
                    status: Some("Active".to_string()),
                    ..ListFilter::default()
                },
            )
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidQuery);
}

#[test]
fn test_customer_listing_by_status() {
    let (_tmp, store) = test_store();
    create_customer(&store, &new_customer("Alice Smith", CustomerStatus::Pending)).unwrap();
    create_customer(&store, &new_customer("Bob Jones", CustomerStatus::Active)).unwrap();

    let active = store
        .broker()
        .with_read("test.customers", |conn| {
            store::list::<Customer>(
                conn,
                &ListFilter {
                    status: Some("Active".to_string()),
                    ..ListFilter::default()
                },
            )
        })
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "Bob Jones");
}

#[test]
fn test_delete_respects_child_relations() {
    let (_tmp, store) = test_store();
    let he = create_headend(
        &store,
        &NewHeadend {
            name: "HE".to_string(),
            location: String::new(),
        },
    )
    .unwrap();
    let fdh = create_fdh(
        &store,
        &NewFdh {
            name: "FDH".to_string(),
            location: String::new(),
            region: None,
            max_ports: 64,
            headend_id: he.id,
        },
    )
    .unwrap();
    let splitter = create_splitter(
        &store,
        &NewSplitter {
            model: "1:8".to_string(),
            port_capacity: 8,
            location: String::new(),
            fdh_id: fdh.id,
        },
    )
    .unwrap();

    let err = store
        .broker()
        .with_write("test.delete", |conn| store::delete::<Headend>(conn, he.id))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HasDependents);

    store
        .broker()
        .with_write("test.delete", |conn| store::delete::<Splitter>(conn, splitter.id))
        .unwrap();
    let missing = store
        .broker()
        .with_write("test.delete", |conn| store::delete::<Splitter>(conn, splitter.id))
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);
}

#[test]
fn test_find_asset_by_serial_and_children() {
    let (_tmp, store) = test_store();
    let customer = create_customer(&store, &new_customer("Alice Smith", CustomerStatus::Active)).unwrap();
    let ont = create_asset(&store, &new_asset(AssetType::Ont, "NK123456", "Warehouse A")).unwrap();
    create_asset(&store, &new_asset(AssetType::Router, "NG789012", "Warehouse A")).unwrap();
    assign_asset(&store, ont.id, customer.id).unwrap();

    let (found, owned, missing) = store
        .broker()
        .with_read("test.lookup", |conn| {
            Ok((
                store::find_asset_by_serial(conn, "NK123456")?,
                store::assets_of(conn, customer.id)?,
                store::find_asset_by_serial(conn, "nope")?,
            ))
        })
        .unwrap();
    assert_eq!(found.map(|a| a.id), Some(ont.id));
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].serial_number, "NK123456");
    assert!(missing.is_none());
}
