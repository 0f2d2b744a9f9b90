//! Integration tests for the `cubes-db` persistence layer.
//!
//! The in-memory and file backends run everywhere. The `Dragonfly` test
//! needs a live instance and is marked `#[ignore]`:
//!
//! ```bash
//! docker run -d -p 6379:6379 docker.dragonflydb.io/dragonflydb/dragonfly
//! cargo test -p cubes-db -- --ignored
//! ```

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeMap;

use cubes_db::{
    DragonflyStore, FileStore, InMemoryStore, KeyValueStore, MEMORY_KEY, REGISTRY_STATE_KEY,
    StateStore, StoreBackend, load_json, save_json,
};
use serde_json::json;

#[tokio::test]
async fn in_memory_round_trip() {
    let store = InMemoryStore::new();
    assert!(store.load(MEMORY_KEY).await.unwrap().is_none());

    store
        .save(MEMORY_KEY, &json!({"cube-1": {"name": "Pip"}}))
        .await
        .unwrap();
    let back = store.load(MEMORY_KEY).await.unwrap();
    assert_eq!(back, Some(json!({"cube-1": {"name": "Pip"}})));
    assert_eq!(store.keys(), vec![MEMORY_KEY.to_owned()]);
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let temp = tempfile::tempdir().expect("temp dir");
    let counters: BTreeMap<String, u32> = [("cube-1".to_owned(), 2)].into_iter().collect();

    {
        let store = FileStore::open(temp.path()).await.expect("open");
        save_json(&store, REGISTRY_STATE_KEY, &counters)
            .await
            .expect("save");
        assert!(store.dir().join("cubes_registry-state.json").exists());
    }

    let reopened = FileStore::open(temp.path()).await.expect("reopen");
    let back: Option<BTreeMap<String, u32>> = load_json(&reopened, REGISTRY_STATE_KEY)
        .await
        .expect("load");
    assert_eq!(back, Some(counters));
    assert!(
        load_json::<BTreeMap<String, u32>>(&reopened, MEMORY_KEY)
            .await
            .expect("load missing")
            .is_none()
    );
}

#[tokio::test]
async fn file_store_rejects_corrupt_blob() {
    let temp = tempfile::tempdir().expect("temp dir");
    std::fs::write(temp.path().join("cubes_memory.json"), "{not json").expect("write");
    let store = FileStore::open(temp.path()).await.expect("open");
    assert!(store.load(MEMORY_KEY).await.is_err());
}

#[tokio::test]
async fn state_store_dispatches() {
    let temp = tempfile::tempdir().expect("temp dir");
    let store = StateStore::open(StoreBackend::File, temp.path(), "redis://unused")
        .await
        .expect("open");
    assert_eq!(store.backend_name(), "file");
    store.save(MEMORY_KEY, &json!([1, 2, 3])).await.expect("save");
    assert_eq!(store.load(MEMORY_KEY).await.expect("load"), Some(json!([1, 2, 3])));
}

#[tokio::test]
#[ignore = "requires a running Dragonfly instance"]
async fn dragonfly_round_trip() {
    let url = std::env::var("DRAGONFLY_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
    let store = DragonflyStore::connect(&url).await.expect("connect");
    store
        .save("cubes:test-blob", &json!({"ok": true}))
        .await
        .expect("save");
    let back = store.load("cubes:test-blob").await.expect("load");
    assert_eq!(back, Some(json!({"ok": true})));
}
