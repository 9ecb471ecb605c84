#![allow(clippy::unwrap_used)]
// Integration tests for `SyncEngine` against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use docsync_api::{MemoryStore, Operation};
use docsync_core::{
    CollectionId, CommandResult, CoreError, Document, DocumentId, DocumentKey, DocumentStore,
    EngineConfig, EntityRecord, EntityState, MemoryNavigator, NavigationEvent, Navigator, Notice,
    Redirect, SyncEngine, WriteKind,
};

// ── Helpers ─────────────────────────────────────────────────────────

const WAIT: Duration = Duration::from_secs(5);

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn key(c: &str, d: &str) -> DocumentKey {
    DocumentKey::new(c, d)
}

fn setup(path: &str) -> (Arc<MemoryStore>, Arc<MemoryNavigator>, SyncEngine) {
    let store = Arc::new(MemoryStore::new());
    let navigator = Arc::new(MemoryNavigator::new(path));
    let engine = SyncEngine::start(
        EngineConfig::default(),
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        Arc::clone(&navigator) as Arc<dyn docsync_core::Navigator>,
    );
    (store, navigator, engine)
}

/// Wait until `key` holds pushed data.
async fn loaded(engine: &SyncEngine, key: &DocumentKey) -> Arc<EntityRecord> {
    let mut stream = engine.watch(key);
    tokio::time::timeout(WAIT, stream.loaded())
        .await
        .expect("entity never loaded")
        .expect("cache dropped")
}

/// Wait until `key` has no cache slot.
async fn gone(engine: &SyncEngine, key: &DocumentKey) {
    let mut stream = engine.watch(key);
    tokio::time::timeout(WAIT, stream.wait_for(Option::is_none))
        .await
        .expect("entity never removed")
        .expect("cache dropped");
}

/// Parent `P1` with children `c1` (which has child `c1a`) and `c2`.
fn seed_family(store: &MemoryStore) {
    store.seed(
        "Parent",
        "P1",
        doc(json!({ "Name": "Smith", "NestedCollections": { "Child": ["c1", "c2"] } })),
    );
    store.seed(
        "Child",
        "c1",
        doc(json!({
            "Name": "Ann",
            "ParentType": "Parent",
            "ParentCollectionId": "P1",
            "NestedCollections": { "Child": ["c1a"] }
        })),
    );
    store.seed(
        "Child",
        "c1a",
        doc(json!({ "Name": "Bea", "ParentType": "Child", "ParentCollectionId": "c1" })),
    );
    store.seed(
        "Child",
        "c2",
        doc(json!({ "Name": "Cal", "ParentType": "Parent", "ParentCollectionId": "P1" })),
    );
}

async fn open_family(engine: &SyncEngine) {
    engine.open(key("Parent", "P1")).await.unwrap();
    for k in [
        key("Parent", "P1"),
        key("Child", "c1"),
        key("Child", "c1a"),
        key("Child", "c2"),
    ] {
        loaded(engine, &k).await;
    }
}

// ── Subscriptions ───────────────────────────────────────────────────

#[tokio::test]
async fn test_open_loads_entity_and_tracks_children() {
    let (store, _nav, engine) = setup("/Parent/P1");
    seed_family(&store);

    open_family(&engine).await;

    assert_eq!(engine.read("Parent", "P1", "Name"), json!("Smith"));
    assert_eq!(engine.read("Child", "c1a", "Name"), json!("Bea"));
    assert_eq!(engine.entity_state(&key("Child", "c2")), EntityState::Live);
    assert_eq!(engine.subscription_count().await.unwrap(), 4);
    assert_eq!(store.total_active_subscriptions(), 4);
}

#[tokio::test]
async fn test_watch_stream_yields_slot_changes() {
    let (store, _nav, engine) = setup("/Parent/P1");
    store.seed("Parent", "P1", doc(json!({ "Name": "Smith" })));

    let mut stream = engine.watch(&key("Parent", "P1")).into_stream();
    assert_eq!(stream.next().await, Some(None));

    engine.open(key("Parent", "P1")).await.unwrap();
    let live = tokio::time::timeout(WAIT, async {
        while let Some(slot) = stream.next().await {
            if let Some(record) = slot.filter(|r| r.is_loaded()) {
                return record;
            }
        }
        panic!("stream ended before the entity loaded");
    })
    .await
    .expect("entity never loaded");

    assert_eq!(live.field("Name"), Some(&json!("Smith")));
}

#[tokio::test]
async fn test_open_add_creates() {
    let (store, _nav, engine) = setup("/Child/add");

    let result = engine.open(key("Child", "add")).await.unwrap();
    let CommandResult::Created(created) = result else {
        panic!("expected Created, got {result:?}");
    };
    assert_eq!(created.collection, CollectionId::from("Child"));
    assert!(store.document("Child", created.doc.as_str()).is_some());
}

#[tokio::test]
async fn test_reopen_replaces_subscription() {
    let (store, _nav, engine) = setup("/Parent/P1");
    store.seed("Parent", "P1", doc(json!({ "Name": "Smith" })));

    engine.open(key("Parent", "P1")).await.unwrap();
    loaded(&engine, &key("Parent", "P1")).await;
    engine.open(key("Parent", "P1")).await.unwrap();
    loaded(&engine, &key("Parent", "P1")).await;

    assert_eq!(engine.subscription_count().await.unwrap(), 1);
    assert_eq!(store.active_subscriptions("Parent", "P1"), 1);
}

#[tokio::test]
async fn test_remote_delete_removes_slot_and_subscription() {
    let (store, _nav, engine) = setup("/Parent/P1");
    store.seed("Parent", "P1", doc(json!({ "Name": "Smith" })));
    engine.open(key("Parent", "P1")).await.unwrap();
    loaded(&engine, &key("Parent", "P1")).await;

    // Someone else deletes the document.
    store
        .delete(&CollectionId::from("Parent"), &DocumentId::from("P1"))
        .await
        .unwrap();
    gone(&engine, &key("Parent", "P1")).await;

    assert!(!engine.is_subscribed(key("Parent", "P1")).await.unwrap());
    assert_eq!(store.active_subscriptions("Parent", "P1"), 0);
    assert_eq!(engine.read("Parent", "P1", "Name"), json!(""));
}

#[tokio::test]
async fn test_open_missing_document_ends_absent() {
    let (store, _nav, engine) = setup("/Parent/nope");

    engine.open(key("Parent", "nope")).await.unwrap();
    gone(&engine, &key("Parent", "nope")).await;

    assert_eq!(
        engine.entity_state(&key("Parent", "nope")),
        EntityState::Unloaded
    );
    assert_eq!(engine.subscription_count().await.unwrap(), 0);
    assert_eq!(store.total_active_subscriptions(), 0);
}

#[tokio::test]
async fn test_redelivered_push_is_idempotent() {
    let (store, _nav, engine) = setup("/Parent/P1");
    seed_family(&store);
    open_family(&engine).await;

    let before = engine.cache().get(&key("Parent", "P1")).unwrap();
    let mut version = engine.cache().subscribe_version();
    let seen = *version.borrow_and_update();

    // Same payload pushed again.
    store.seed("Parent", "P1", before.data.clone().unwrap());
    tokio::time::timeout(WAIT, version.wait_for(|v| *v > seen))
        .await
        .unwrap()
        .unwrap();

    let after = engine.cache().get(&key("Parent", "P1")).unwrap();
    assert_eq!(*after, *before);
    assert_eq!(engine.subscription_count().await.unwrap(), 4);
    assert_eq!(store.total_active_subscriptions(), 4);
}

#[tokio::test]
async fn test_cyclic_nested_collections_terminate() {
    let (store, _nav, engine) = setup("/Parent/P1");
    store.seed(
        "Parent",
        "P1",
        doc(json!({ "NestedCollections": { "Child": ["c1"] } })),
    );
    store.seed(
        "Child",
        "c1",
        doc(json!({ "NestedCollections": { "Parent": ["P1"] } })),
    );

    engine.open(key("Parent", "P1")).await.unwrap();
    loaded(&engine, &key("Child", "c1")).await;

    assert_eq!(engine.subscription_count().await.unwrap(), 2);
    assert_eq!(store.total_active_subscriptions(), 2);
}

#[tokio::test]
async fn test_subscription_failure_leaves_slot_subscribing() {
    let (store, _nav, engine) = setup("/Parent/P1");
    store.seed("Parent", "P1", doc(json!({ "Name": "Smith" })));
    store.fail_subscriptions(true);

    engine.open(key("Parent", "P1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        engine.entity_state(&key("Parent", "P1")),
        EntityState::Subscribing
    );
    assert_eq!(engine.read("Parent", "P1", "Name"), json!(""));
}

// ── Create ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_under_parent_links_both_ways() {
    let (store, nav, engine) = setup("/Parent/P1");
    store.seed("Parent", "P1", doc(json!({ "Name": "Smith" })));
    engine.open(key("Parent", "P1")).await.unwrap();
    loaded(&engine, &key("Parent", "P1")).await;

    nav.set_path("/Parent/P1/Child/add");
    let child = engine.create(CollectionId::from("Child")).await.unwrap();

    // Seed fields point at the parent.
    let stored = store.document("Child", child.doc.as_str()).unwrap();
    assert_eq!(stored["ParentType"], json!("Parent"));
    assert_eq!(stored["ParentCollectionId"], json!("P1"));

    // The parent's cached nested collection lists the child.
    let parent = engine.cache().get(&key("Parent", "P1")).unwrap();
    assert_eq!(
        parent.field("NestedCollections").cloned().unwrap(),
        json!({ "Child": [child.doc.as_str()] })
    );
    assert!(engine.is_subscribed(child.clone()).await.unwrap());

    // A later write-through lands after the parent link.
    engine.commit(key("Parent", "P1")).await.unwrap();
    let stored_parent = store.document("Parent", "P1").unwrap();
    assert_eq!(
        stored_parent["NestedCollections"],
        json!({ "Child": [child.doc.as_str()] })
    );

    assert_eq!(
        nav.history(),
        vec![NavigationEvent::Replace(format!(
            "/Parent/P1/Child/{}",
            child.doc
        ))]
    );
}

#[tokio::test]
async fn test_create_keeps_children_added_by_others() {
    let (store, _nav, engine) = setup("/Parent/P1/Child/add");
    store.seed(
        "Parent",
        "P1",
        doc(json!({ "NestedCollections": { "Child": ["other"] } })),
    );
    store.seed("Child", "other", doc(json!({})));
    engine.open(key("Parent", "P1")).await.unwrap();
    loaded(&engine, &key("Parent", "P1")).await;

    let child = engine.create(CollectionId::from("Child")).await.unwrap();

    let parent = engine.cache().get(&key("Parent", "P1")).unwrap();
    assert_eq!(
        parent.field("NestedCollections").cloned().unwrap(),
        json!({ "Child": ["other", child.doc.as_str()] })
    );
}

#[tokio::test]
async fn test_create_top_level_has_no_parent_fields() {
    let (store, nav, engine) = setup("/Household/add");

    let created = engine
        .create(CollectionId::from("Household"))
        .await
        .unwrap();

    let stored = store.document("Household", created.doc.as_str()).unwrap();
    assert!(stored.is_empty());
    assert_eq!(nav.current_path(), format!("/Household/{}", created.doc));
    assert_eq!(store.operations(), vec![Operation::Add(created)]);
}

#[tokio::test]
async fn test_create_with_unloaded_parent_publishes_notice() {
    let (store, _nav, engine) = setup("/Parent/P9/Child/add");
    let mut notices = engine.notices();

    let child = engine.create(CollectionId::from("Child")).await.unwrap();

    // The child exists and is seeded, but the parent could not be linked.
    assert!(store.document("Child", child.doc.as_str()).is_some());
    assert_eq!(
        notices.try_recv().unwrap(),
        Notice::EntityGone {
            key: key("Parent", "P9")
        }
    );
}

// ── Update / commit ─────────────────────────────────────────────────

#[tokio::test]
async fn test_update_merges_and_writes_through() {
    let (store, _nav, engine) = setup("/Parent/P1");
    store.seed("Parent", "P1", doc(json!({ "Name": "Smith", "Age": 40 })));
    engine.open(key("Parent", "P1")).await.unwrap();
    loaded(&engine, &key("Parent", "P1")).await;

    engine
        .update(
            key("Parent", "P1"),
            doc(json!({ "Name": "Jones", "City": "Oslo" })),
        )
        .await
        .unwrap();

    // Optimistic value is visible immediately.
    assert_eq!(engine.read("Parent", "P1", "Name"), json!("Jones"));
    assert_eq!(
        Value::Object(store.document("Parent", "P1").unwrap()),
        json!({ "Name": "Jones", "Age": 40, "City": "Oslo" })
    );
    assert_eq!(
        store.operations(),
        vec![Operation::Update(key("Parent", "P1"))]
    );
}

#[tokio::test]
async fn test_update_gone_entity_fails_with_notice() {
    let (store, _nav, engine) = setup("/Parent/P1");
    let mut notices = engine.notices();

    let err = engine
        .update(key("Parent", "P1"), doc(json!({ "Name": "Jones" })))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::EntityGone { .. }));
    assert_eq!(
        notices.try_recv().unwrap(),
        Notice::EntityGone {
            key: key("Parent", "P1")
        }
    );
    assert!(store.operations().is_empty());
}

#[tokio::test]
async fn test_commit_without_data_is_skipped() {
    let (store, _nav, engine) = setup("/");

    let result = engine.commit(key("Parent", "P1")).await.unwrap();

    assert_eq!(result, CommandResult::Skipped);
    assert!(store.operations().is_empty());
}

#[tokio::test]
async fn test_remote_write_failures_are_classified() {
    let (store, _nav, engine) = setup("/Parent/P1");
    store.seed("Parent", "P1", doc(json!({ "Name": "Smith" })));
    engine.open(key("Parent", "P1")).await.unwrap();
    loaded(&engine, &key("Parent", "P1")).await;
    store.fail_writes(true);

    let err = engine
        .update(key("Parent", "P1"), doc(json!({ "Name": "Jones" })))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::RemoteWrite {
            kind: WriteKind::Update,
            ..
        }
    ));

    let err = engine
        .create(CollectionId::from("Child"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::RemoteWrite {
            kind: WriteKind::Create,
            ..
        }
    ));

    // Stored data is untouched.
    assert_eq!(
        store.document("Parent", "P1").unwrap()["Name"],
        json!("Smith")
    );
}

// ── Delete ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_cascades_children_first() {
    let (store, nav, engine) = setup("/Parent/P1");
    seed_family(&store);
    open_family(&engine).await;

    engine
        .delete(
            key("Parent", "P1"),
            Some(Redirect::Replace("/Parent".into())),
        )
        .await
        .unwrap();

    assert_eq!(
        store.operations(),
        vec![
            Operation::Delete(key("Child", "c1a")),
            Operation::Delete(key("Child", "c1")),
            Operation::Delete(key("Child", "c2")),
            Operation::Delete(key("Parent", "P1")),
        ]
    );
    assert!(engine.cache().is_empty());
    assert_eq!(engine.subscription_count().await.unwrap(), 0);
    assert_eq!(store.total_active_subscriptions(), 0);
    assert!(store.is_empty());
    assert_eq!(
        nav.history(),
        vec![NavigationEvent::Replace("/Parent".into())]
    );
}

#[tokio::test]
async fn test_delete_child_unlinks_from_parent() {
    let (store, _nav, engine) = setup("/Parent/P1");
    seed_family(&store);
    open_family(&engine).await;

    engine.delete(key("Child", "c2"), None).await.unwrap();

    assert_eq!(
        store.operations(),
        vec![
            Operation::Update(key("Parent", "P1")),
            Operation::Delete(key("Child", "c2")),
        ]
    );
    assert_eq!(
        store.document("Parent", "P1").unwrap()["NestedCollections"],
        json!({ "Child": ["c1"] })
    );
    assert_eq!(
        engine.entity_state(&key("Child", "c2")),
        EntityState::Unloaded
    );
    assert!(!engine.is_subscribed(key("Child", "c2")).await.unwrap());
    assert_eq!(engine.subscription_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_delete_failure_skips_redirect() {
    let (store, nav, engine) = setup("/Parent/P1");
    store.seed("Parent", "P1", doc(json!({ "Name": "Smith" })));
    engine.open(key("Parent", "P1")).await.unwrap();
    loaded(&engine, &key("Parent", "P1")).await;
    store.fail_writes(true);

    let err = engine
        .delete(key("Parent", "P1"), Some(Redirect::Push("/Parent".into())))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::RemoteWrite {
            kind: WriteKind::Delete,
            ..
        }
    ));
    assert!(nav.history().is_empty());
    // The local side is already gone.
    assert_eq!(
        engine.entity_state(&key("Parent", "P1")),
        EntityState::Unloaded
    );
}

// ── Unlink ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unlink_removes_child_reference() {
    let (store, _nav, engine) = setup("/Parent/P1");
    seed_family(&store);
    open_family(&engine).await;

    let result = engine
        .unlink(key("Parent", "P1"), key("Child", "c1"))
        .await
        .unwrap();

    assert_eq!(result, CommandResult::Ok);
    assert_eq!(
        store.document("Parent", "P1").unwrap()["NestedCollections"],
        json!({ "Child": ["c2"] })
    );
    // The child itself is untouched.
    assert!(store.document("Child", "c1").is_some());
}

#[tokio::test]
async fn test_unlink_unloaded_parent_is_skipped() {
    let (store, _nav, engine) = setup("/");

    let result = engine
        .unlink(key("Parent", "P1"), key("Child", "c1"))
        .await
        .unwrap();

    assert_eq!(result, CommandResult::Skipped);
    assert!(store.operations().is_empty());
}

// ── Session lifecycle ───────────────────────────────────────────────

#[tokio::test]
async fn test_teardown_cancels_everything() {
    let (store, _nav, engine) = setup("/Parent/P1");
    seed_family(&store);
    open_family(&engine).await;

    engine.teardown().await.unwrap();

    assert!(engine.cache().is_empty());
    assert_eq!(engine.subscription_count().await.unwrap(), 0);
    assert_eq!(store.total_active_subscriptions(), 0);
    assert_eq!(engine.read("Parent", "P1", "Name"), json!(""));
}

#[tokio::test]
async fn test_shutdown_stops_engine() {
    let (store, _nav, engine) = setup("/Parent/P1");
    seed_family(&store);
    open_family(&engine).await;

    engine.shutdown().await;

    assert!(!engine.is_running());
    assert_eq!(store.total_active_subscriptions(), 0);
    let err = engine.open(key("Parent", "P1")).await.unwrap_err();
    assert!(matches!(err, CoreError::EngineStopped));
}

#[tokio::test]
async fn test_fetch_bypasses_cache() {
    let (store, _nav, engine) = setup("/");
    store.seed("Parent", "P1", doc(json!({ "Name": "Smith" })));

    let snapshot = engine.fetch(&key("Parent", "P1")).await.unwrap();

    assert_eq!(snapshot.data.unwrap()["Name"], json!("Smith"));
    assert_eq!(
        engine.entity_state(&key("Parent", "P1")),
        EntityState::Unloaded
    );
    assert_eq!(engine.subscription_count().await.unwrap(), 0);
}
