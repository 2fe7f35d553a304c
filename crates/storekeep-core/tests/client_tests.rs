//! StorageClient tests against the in-memory engine

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;
use storekeep_core::{
    ClientConfig, Engine, ErrorKind, Key, MemoryEngine, MemorySession, SchemaChange,
    StorageClient, StoreError, StoreOptions,
};

/// MemoryEngine that yields to the executor before opening, so concurrent
/// opens on one client interleave the way browser requests do.
#[derive(Clone, Default)]
struct YieldingEngine(MemoryEngine);

#[async_trait(?Send)]
impl Engine for YieldingEngine {
    type Session = MemorySession;

    async fn open(
        &self,
        name: &str,
        version: u32,
        change: Option<&SchemaChange>,
    ) -> storekeep_core::Result<MemorySession> {
        tokio::task::yield_now().await;
        self.0.open(name, version, change).await
    }

    async fn delete_database(&self, name: &str) -> storekeep_core::Result<()> {
        self.0.delete_database(name).await
    }
}

/// Helper to create an opened client with an "items" store
async fn open_with_items(name: &str) -> StorageClient<MemoryEngine> {
    storekeep_core::tracing::init_with_filter("debug");
    let client = StorageClient::in_memory(name, 1);
    client.open().await.unwrap();
    client
        .create_store("items", StoreOptions::default())
        .await
        .unwrap();
    client
}

#[tokio::test]
async fn test_notes_scenario() {
    let client = open_with_items("notes").await;

    let first = client.add("items", json!({"text": "a"})).await.unwrap();
    let second = client.add("items", json!({"text": "b"})).await.unwrap();
    assert_eq!(first, Key::from(1));
    assert_eq!(second, Key::from(2));

    let all = client.get_all("items").await.unwrap();
    assert_eq!(
        all,
        vec![json!({"id": 1, "text": "a"}), json!({"id": 2, "text": "b"})]
    );
}

#[tokio::test]
async fn test_open_is_idempotent() {
    let client = StorageClient::in_memory("notes", 1);
    client.open().await.unwrap();
    client.open().await.unwrap();

    assert!(client.is_open());
    assert_eq!(client.session_version(), Some(1));
    assert_eq!(client.engine().open_sessions("notes"), 1);
    assert_eq!(client.store_names().unwrap(), Vec::<String>::new());
}

#[tokio::test]
async fn test_concurrent_opens_keep_one_connection() {
    let client = StorageClient::new(YieldingEngine::default(), "notes", 1);

    let (a, b) = tokio::join!(client.open(), client.open());
    a.unwrap();
    b.unwrap();

    assert!(client.is_open());
    assert_eq!(client.engine().0.open_sessions("notes"), 1);

    // The surviving connection does not block an upgrade
    client
        .create_store("items", StoreOptions::default())
        .await
        .unwrap();
    assert_eq!(client.store_names().unwrap(), vec!["items"]);
}

#[tokio::test]
async fn test_open_zero_version_fails() {
    let client = StorageClient::in_memory("notes", 0);
    let err = client.open().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(!client.is_open());
}

#[tokio::test]
async fn test_create_store_twice_is_noop() {
    let client = open_with_items("notes").await;
    client.add("items", json!({"text": "kept"})).await.unwrap();

    client
        .create_store("items", StoreOptions::default())
        .await
        .unwrap();

    assert_eq!(client.store_names().unwrap(), vec!["items"]);
    assert_eq!(client.get_all("items").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_store_opens_next_version_without_advancing_config() {
    let client = open_with_items("notes").await;

    assert_eq!(client.version(), 1);
    assert_eq!(client.session_version(), Some(2));
    assert_eq!(client.engine().database_version("notes"), Some(2));
}

#[tokio::test]
async fn test_second_store_needs_version_bump() {
    let client = open_with_items("notes").await;

    // Database already sits at version + 1, so no upgrade runs
    let err = client
        .create_store("tags", StoreOptions::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::Version(
            "database already at version 2; advance with set_version".into()
        )
    );
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(client.store_names().unwrap(), vec!["items"]);
    assert_eq!(client.session_version(), Some(2));

    client.set_version(2);
    client
        .create_store("tags", StoreOptions::default())
        .await
        .unwrap();
    assert_eq!(client.store_names().unwrap(), vec!["items", "tags"]);
    assert_eq!(client.session_version(), Some(3));
}

#[tokio::test]
async fn test_reopen_at_configured_version_after_upgrade_fails() {
    let client = open_with_items("notes").await;
    client.close();

    let err = client.open().await.unwrap_err();
    assert!(matches!(err, StoreError::Version(_)));
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[tokio::test]
async fn test_delete_store() {
    let client = open_with_items("notes").await;
    client.set_version(2);

    client.delete_store("items").await.unwrap();

    assert_eq!(client.store_names().unwrap(), Vec::<String>::new());
    let err = client.get_all("items").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_store_without_version_bump_fails() {
    let client = open_with_items("notes").await;
    client.add("items", json!({"text": "a"})).await.unwrap();

    let err = client.delete_store("items").await.unwrap_err();
    assert!(matches!(err, StoreError::Version(_)));

    // Nothing was removed and the client is still usable
    assert!(client.is_open());
    assert_eq!(client.store_names().unwrap(), vec!["items"]);
    assert_eq!(client.get_all("items").await.unwrap().len(), 1);
    assert_eq!(client.engine().open_sessions("notes"), 1);
}

#[tokio::test]
async fn test_delete_missing_store_fails_and_keeps_session() {
    let client = open_with_items("notes").await;

    let err = client.delete_store("missing").await.unwrap_err();
    assert!(matches!(err, StoreError::Upgrade(_)));
    assert_eq!(err.kind(), ErrorKind::Connection);

    // Session untouched
    assert!(client.is_open());
    assert_eq!(client.session_version(), Some(2));
    client.add("items", json!({"text": "still works"})).await.unwrap();
}

#[tokio::test]
async fn test_failed_upgrade_leaves_client_closed() {
    let engine = MemoryEngine::new();
    let client = StorageClient::new(engine.clone(), "notes", 1);
    client.open().await.unwrap();

    // A second connection blocks the upgrade
    let other = StorageClient::new(engine, "notes", 1);
    other.open().await.unwrap();

    let err = client
        .create_store("items", StoreOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Blocked(_)));
    assert!(!client.is_open());
    assert_eq!(
        client.get_all("items").await.unwrap_err(),
        StoreError::not_open()
    );
}

#[tokio::test]
async fn test_round_trip() {
    let client = open_with_items("notes").await;

    let key = client.add("items", json!({"value": "x"})).await.unwrap();
    let record = client.get_by_id("items", key.clone()).await.unwrap();

    assert_eq!(record, Some(json!({"id": key.to_value(), "value": "x"})));
}

#[tokio::test]
async fn test_update_overwrites_in_place() {
    let client = open_with_items("notes").await;
    let key = client.add("items", json!({"value": "x"})).await.unwrap();
    client.add("items", json!({"value": "other"})).await.unwrap();

    let written = client
        .update("items", json!({"id": 1, "value": "y"}))
        .await
        .unwrap();

    assert_eq!(written, key);
    assert_eq!(client.get_all("items").await.unwrap().len(), 2);
    let record = client.get_by_id("items", 1).await.unwrap().unwrap();
    assert_eq!(record["value"], "y");
}

#[tokio::test]
async fn test_update_inserts_missing() {
    let client = open_with_items("notes").await;

    let key = client
        .update("items", json!({"id": 7, "value": "new"}))
        .await
        .unwrap();
    assert_eq!(key, Key::from(7));

    // Generator continues past the explicit key
    let next = client.add("items", json!({"value": "after"})).await.unwrap();
    assert_eq!(next, Key::from(8));
}

#[tokio::test]
async fn test_delete_record() {
    let client = open_with_items("notes").await;
    let a = client.add("items", json!({"text": "a"})).await.unwrap();
    let b = client.add("items", json!({"text": "b"})).await.unwrap();

    client.delete("items", a.clone()).await.unwrap();

    assert_eq!(client.get_by_id("items", a).await.unwrap(), None);
    let all = client.get_all("items").await.unwrap();
    assert_eq!(all, vec![json!({"id": b.to_value(), "text": "b"})]);
}

#[tokio::test]
async fn test_delete_absent_record_is_noop() {
    let client = open_with_items("notes").await;
    client.delete("items", 42).await.unwrap();
}

#[tokio::test]
async fn test_get_missing_is_none_not_error() {
    let client = open_with_items("notes").await;
    assert_eq!(client.get_by_id("items", 1).await.unwrap(), None);
    assert_eq!(client.get_all("items").await.unwrap(), Vec::<serde_json::Value>::new());
}

#[tokio::test]
async fn test_duplicate_add_is_constraint_error() {
    let client = open_with_items("notes").await;
    client
        .add("items", json!({"id": 1, "text": "a"}))
        .await
        .unwrap();

    let err = client
        .add("items", json!({"id": 1, "text": "b"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Constraint);

    let record = client.get_by_id("items", 1).await.unwrap().unwrap();
    assert_eq!(record["text"], "a");
}

#[tokio::test]
async fn test_invalid_key_is_constraint_error() {
    let client = open_with_items("notes").await;
    let err = client
        .add("items", json!({"id": true}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Constraint);
}

#[tokio::test]
async fn test_schema_operations_before_open() {
    let client = StorageClient::in_memory("notes", 1);

    let err = client
        .create_store("items", StoreOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::not_open());

    let err = client.delete_store("items").await.unwrap_err();
    assert_eq!(err, StoreError::not_open());
}

#[tokio::test]
async fn test_record_operations_before_open() {
    // Record operations are guarded the same way as schema operations
    let client = StorageClient::in_memory("notes", 1);

    assert_eq!(client.get_all("items").await.unwrap_err().kind(), ErrorKind::State);
    assert_eq!(
        client.get_by_id("items", 1).await.unwrap_err().kind(),
        ErrorKind::State
    );
    assert_eq!(
        client.add("items", json!({})).await.unwrap_err().kind(),
        ErrorKind::State
    );
    assert_eq!(
        client.update("items", json!({})).await.unwrap_err().kind(),
        ErrorKind::State
    );
    assert_eq!(
        client.delete("items", 1).await.unwrap_err().kind(),
        ErrorKind::State
    );
    assert_eq!(client.store_names().unwrap_err().kind(), ErrorKind::State);
}

#[tokio::test]
async fn test_delete_database_blocked_while_open() {
    let client = open_with_items("notes").await;

    client.add("items", json!({"text": "a"})).await.unwrap();

    let err = client.delete_database().await.unwrap_err();
    assert!(matches!(err, StoreError::Blocked(_)));
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(client.is_open());

    // The refused delete does not run once the session goes away
    client.close();
    client.set_version(2);
    client.open().await.unwrap();
    assert_eq!(client.store_names().unwrap(), vec!["items"]);
    assert_eq!(client.get_all("items").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_database_then_reopen_is_empty() {
    let client = open_with_items("notes").await;
    client.add("items", json!({"text": "a"})).await.unwrap();
    client.close();

    client.delete_database().await.unwrap();
    assert_eq!(client.engine().database_names(), Vec::<String>::new());

    client.open().await.unwrap();
    assert_eq!(client.store_names().unwrap(), Vec::<String>::new());
    assert_eq!(client.session_version(), Some(1));
}

#[tokio::test]
async fn test_delete_nonexistent_database() {
    let client = StorageClient::in_memory("never-opened", 1);
    client.delete_database().await.unwrap();
}

#[tokio::test]
async fn test_custom_key_path() {
    let client = StorageClient::in_memory("people", 1);
    client.open().await.unwrap();
    client
        .create_store(
            "people",
            StoreOptions::new().key_path("email").auto_increment(false),
        )
        .await
        .unwrap();

    let key = client
        .add("people", json!({"email": "b@example.com", "name": "B"}))
        .await
        .unwrap();
    client
        .add("people", json!({"email": "a@example.com", "name": "A"}))
        .await
        .unwrap();
    assert_eq!(key, Key::from("b@example.com"));

    // Ordered by key, not insertion
    let names: Vec<String> = client
        .get_all("people")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["A", "B"]);

    let err = client
        .add("people", json!({"name": "no key"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Constraint);
}

#[tokio::test]
async fn test_nested_key_path_injection() {
    let client = StorageClient::in_memory("docs", 1);
    client.open().await.unwrap();
    client
        .create_store("docs", StoreOptions::new().key_path("meta.id"))
        .await
        .unwrap();

    let key = client.add("docs", json!({"body": "hello"})).await.unwrap();
    let record = client.get_by_id("docs", key).await.unwrap();
    assert_eq!(record, Some(json!({"body": "hello", "meta": {"id": 1}})));
}

#[tokio::test]
async fn test_typed_reads() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
        text: String,
    }

    let client = open_with_items("notes").await;
    client.add("items", json!({"text": "a"})).await.unwrap();

    let items: Vec<Item> = client.get_all_as("items").await.unwrap();
    assert_eq!(
        items,
        vec![Item {
            id: 1,
            text: "a".into()
        }]
    );

    let item: Option<Item> = client.get_by_id_as("items", 1).await.unwrap();
    assert_eq!(item.map(|i| i.text), Some("a".to_string()));

    client.add("items", json!({"text": 5})).await.unwrap();
    let err = client.get_all_as::<Item>("items").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
}

#[tokio::test]
async fn test_from_config() {
    let config: ClientConfig = serde_json::from_value(json!({"name": "cfg", "version": 3})).unwrap();
    let client = StorageClient::from_config(MemoryEngine::new(), &config);
    client.open().await.unwrap();

    assert_eq!(client.name(), "cfg");
    assert_eq!(client.session_version(), Some(3));
}

#[tokio::test]
async fn test_clients_share_engine() {
    let engine = MemoryEngine::new();
    let writer = StorageClient::new(engine.clone(), "shared", 1);
    writer.open().await.unwrap();
    writer
        .create_store("items", StoreOptions::default())
        .await
        .unwrap();
    writer.add("items", json!({"text": "a"})).await.unwrap();

    let reader = StorageClient::new(engine.clone(), "shared", 2);
    reader.open().await.unwrap();
    assert_eq!(reader.get_all("items").await.unwrap().len(), 1);
    assert_eq!(engine.open_sessions("shared"), 2);

    writer.close();
    reader.close();
    assert_eq!(engine.open_sessions("shared"), 0);
}

#[tokio::test]
async fn test_concurrent_writes_interleave() {
    let client = open_with_items("notes").await;

    let (a, b) = tokio::join!(
        client.add("items", json!({"text": "a"})),
        client.add("items", json!({"text": "b"}))
    );
    let mut keys = vec![a.unwrap(), b.unwrap()];
    keys.sort();

    assert_eq!(keys, vec![Key::from(1), Key::from(2)]);
    assert_eq!(client.get_all("items").await.unwrap().len(), 2);
}
