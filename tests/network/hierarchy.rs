use fibermap::core::config::Config;
use fibermap::core::store::Store;
use fibermap::network::hierarchy::{headend_tree, list_fdhs, list_splitters, render_text};
use fibermap::network::integrity::{
    create_customer, create_fdh, create_headend, create_splitter, attach_customer, update_splitter,
};
use fibermap::network::model::{NewCustomer, NewFdh, NewHeadend, NewSplitter, SplitterUpdate};
use fibermap::network::seed::seed;
use tempfile::tempdir;

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::with_config(tmp.path().to_path_buf(), Config::default()).unwrap();
    (tmp, store)
}

#[test]
fn test_empty_store_has_empty_tree() {
    let (_tmp, store) = test_store();
    assert!(headend_tree(&store).unwrap().is_empty());
    assert_eq!(render_text(&[]), "No headends found.");
}

#[test]
fn test_seeded_tree_shape() {
    let (_tmp, store) = test_store();
    let report = seed(&store).unwrap();
    assert!(report.seeded);

    let trees = headend_tree(&store).unwrap();
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].headend.name, "Main Headend");
    assert_eq!(trees[0].fdhs.len(), 1);
    let fdh = &trees[0].fdhs[0];
    assert_eq!(fdh.fdh.name, "FDH-01-North");
    assert_eq!(fdh.fdh.max_ports, 128);
    let models: Vec<_> = fdh.splitters.iter().map(|s| s.model.as_str()).collect();
    assert_eq!(models, vec!["1:32", "1:16"]);

    // Seeding twice is a no-op.
    assert!(!seed(&store).unwrap().seeded);
    assert_eq!(list_splitters(&store).unwrap().len(), 2);
}

#[test]
fn test_tree_json_is_flattened() {
    let (_tmp, store) = test_store();
    seed(&store).unwrap();
    let json = serde_json::to_value(headend_tree(&store).unwrap()).unwrap();
    assert_eq!(json[0]["name"], "Main Headend");
    assert_eq!(json[0]["fdhs"][0]["region"], "North");
    assert_eq!(json[0]["fdhs"][0]["splitters"][1]["port_capacity"], 16);
}

#[test]
fn test_order_is_stable_across_unrelated_changes() {
    let (_tmp, store) = test_store();
    let mut headends = Vec::new();
    for name in ["Zulu", "Alpha", "Mike"] {
        headends.push(
            create_headend(
                &store,
                &NewHeadend {
                    name: name.to_string(),
                    location: String::new(),
                },
            )
            .unwrap(),
        );
    }
    let mut fdhs = Vec::new();
    for (i, he) in headends.iter().enumerate() {
        fdhs.push(
            create_fdh(
                &store,
                &NewFdh {
                    name: format!("FDH-{}", i),
                    location: String::new(),
                    region: None,
                    max_ports: 64,
                    headend_id: he.id,
                },
            )
            .unwrap(),
        );
    }
    let s1 = create_splitter(
        &store,
        &NewSplitter {
            model: "1:8".to_string(),
            port_capacity: 8,
            location: "A".to_string(),
            fdh_id: fdhs[0].id,
        },
    )
    .unwrap();
    create_splitter(
        &store,
        &NewSplitter {
            model: "1:4".to_string(),
            port_capacity: 4,
            location: "B".to_string(),
            fdh_id: fdhs[0].id,
        },
    )
    .unwrap();

    let names = |store: &Store| -> Vec<String> {
        headend_tree(store)
            .unwrap()
            .into_iter()
            .map(|t| t.headend.name)
            .collect()
    };
    let before = names(&store);
    assert_eq!(before, vec!["Zulu", "Alpha", "Mike"]);

    // Updating and attaching does not reorder anything.
    update_splitter(
        &store,
        s1.id,
        &SplitterUpdate {
            location: Some("Z".to_string()),
            ..SplitterUpdate::default()
        },
    )
    .unwrap();
    let c = create_customer(
        &store,
        &NewCustomer {
            name: "Alice".to_string(),
            address: String::new(),
            neighborhood: None,
            plan: None,
            connection_type: Default::default(),
            status: Default::default(),
        },
    )
    .unwrap();
    attach_customer(&store, c.id, s1.id, None).unwrap();

    assert_eq!(names(&store), before);
    let trees = headend_tree(&store).unwrap();
    let splitters = &trees[0].fdhs[0].splitters;
    assert_eq!(splitters[0].id, s1.id);
    assert_eq!(splitters[0].used_ports, 1);
    assert_eq!(list_fdhs(&store).unwrap().len(), 3);
}

#[test]
fn test_render_text_lists_every_level() {
    let (_tmp, store) = test_store();
    seed(&store).unwrap();
    colored::control::set_override(false);
    let text = render_text(&headend_tree(&store).unwrap());
    assert!(text.contains("Headend Main Headend (123 Core St)"));
    assert!(text.contains("FDH FDH-01-North [48/128 ports allocated]"));
    assert!(text.contains("1:32 (Slot 1, Shelf 1) 0/32"));
}
