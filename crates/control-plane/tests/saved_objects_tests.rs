use serde_json::json;

use control_plane::{
    InMemorySavedObjects, Namespace, SavedObjectsClient, SledSavedObjects, StoreError,
};

fn exercise(store: &dyn SavedObjectsClient) {
    let ops = Namespace::new("ops");
    let created = store
        .create(Some(&ops), "alert", Some("r1"), json!({"name": "cpu", "enabled": true}))
        .expect("create");
    assert_eq!(created.version, 1);

    let conflict = store.create(Some(&ops), "alert", Some("r1"), json!({}));
    assert!(matches!(conflict, Err(StoreError::Conflict { .. })));

    let other_space = store.get(None, "alert", "r1");
    assert!(matches!(other_space, Err(StoreError::NotFound { .. })));

    let updated = store
        .update(Some(&ops), "alert", "r1", json!({"enabled": false}), Some(1))
        .expect("update");
    assert_eq!(updated.version, 2);
    assert_eq!(updated.attributes["name"], "cpu");
    assert_eq!(updated.attributes["enabled"], false);

    let stale = store.update(Some(&ops), "alert", "r1", json!({}), Some(1));
    assert!(matches!(stale, Err(StoreError::Conflict { .. })));

    store
        .create(None, "alert", Some("r2"), json!({"name": "disk"}))
        .expect("create default");
    store
        .create(Some(&ops), "action", Some("a1"), json!({"name": "email"}))
        .expect("create action");
    let found = store.find(Some(&ops), "alert").expect("find");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "r1");

    store.delete(Some(&ops), "alert", "r1").expect("delete");
    assert!(store.get(Some(&ops), "alert", "r1").expect_err("gone").is_not_found());
    assert!(store.delete(Some(&ops), "alert", "r1").is_err());
}

#[test]
fn in_memory_store_is_namespaced_and_versioned() {
    exercise(&InMemorySavedObjects::new());
}

#[test]
fn sled_store_is_namespaced_and_versioned() {
    exercise(&SledSavedObjects::temporary().expect("sled"));
}

#[test]
fn generated_ids_are_unique() {
    let store = InMemorySavedObjects::new();
    let a = store.create(None, "alert", None, json!({})).expect("a");
    let b = store.create(None, "alert", None, json!({})).expect("b");
    assert_ne!(a.id, b.id);
    assert_eq!(store.len(), 2);
}

#[test]
fn sled_versioned_updates_race_to_a_single_winner() {
    let store = SledSavedObjects::temporary().expect("sled");
    store
        .create(None, "alert", Some("r1"), json!({"name": "cpu"}))
        .expect("create");

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let store = store.clone();
            std::thread::spawn(move || {
                store.update(None, "alert", "r1", json!({ "writer": n }), Some(1))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().expect("join")).collect();

    let winners = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| matches!(err, StoreError::Conflict { .. })));
    assert_eq!(store.get(None, "alert", "r1").expect("get").version, 2);
}

#[test]
fn sled_unversioned_updates_are_not_lost() {
    let store = SledSavedObjects::temporary().expect("sled");
    store.create(None, "alert", Some("r1"), json!({})).expect("create");

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let store = store.clone();
            std::thread::spawn(move || {
                store.update(None, "alert", "r1", json!({ format!("k{n}"): n }), None)
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("join").expect("update");
    }

    let object = store.get(None, "alert", "r1").expect("get");
    assert_eq!(object.version, 9);
    assert_eq!(object.attributes.as_object().expect("object").len(), 8);
}

#[test]
fn sled_create_rejects_an_existing_id() {
    let store = SledSavedObjects::temporary().expect("sled");
    store.create(None, "alert", Some("r1"), json!({"n": 1})).expect("create");
    let again = store.create(None, "alert", Some("r1"), json!({"n": 2}));
    assert!(matches!(again, Err(StoreError::Conflict { .. })));
    assert_eq!(store.get(None, "alert", "r1").expect("get").attributes["n"], 1);
}
