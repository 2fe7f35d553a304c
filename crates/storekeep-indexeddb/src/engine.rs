//! IndexedDB implementation of the storage engine traits.

use async_trait::async_trait;
use storekeep_core::{Engine, Key, Record, Result, SchemaChange, Session, StoreError};
use tracing::debug;
use web_sys::{IdbDatabase, IdbFactory, IdbTransactionMode};

use crate::convert::{js_array_to_records, js_to_key, js_to_record, key_to_js, record_to_js};
use crate::idb;

/// IndexedDB-backed engine for browser WASM.
///
/// Wraps the global `indexedDB` factory. All methods are async because
/// IndexedDB is callback-based.
#[derive(Debug, Clone)]
pub struct IdbEngine {
    factory: IdbFactory,
}

impl IdbEngine {
    /// Resolve the global IndexedDB factory.
    pub fn new() -> Result<Self> {
        let factory = idb::idb_factory()?;
        Ok(Self { factory })
    }
}

#[async_trait(?Send)]
impl Engine for IdbEngine {
    type Session = IdbSession;

    async fn open(
        &self,
        name: &str,
        version: u32,
        change: Option<&SchemaChange>,
    ) -> Result<IdbSession> {
        let db = idb::open_database(&self.factory, name, version, change).await?;
        debug!("IndexedDB '{}' open at version {}", name, db.version());
        Ok(IdbSession {
            db,
            name: name.to_string(),
        })
    }

    /// A delete blocked by another connection fails with
    /// [`StoreError::Blocked`], but IndexedDB keeps the request queued: the
    /// database is still removed once every blocking connection closes.
    async fn delete_database(&self, name: &str) -> Result<()> {
        idb::delete_database(&self.factory, name).await
    }
}

/// Open IndexedDB connection.
#[derive(Debug, Clone)]
pub struct IdbSession {
    db: IdbDatabase,
    name: String,
}

#[async_trait(?Send)]
impl Session for IdbSession {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.db.version() as u32
    }

    fn store_names(&self) -> Vec<String> {
        let list = self.db.object_store_names();
        let mut names: Vec<String> = (0..list.length()).filter_map(|i| list.item(i)).collect();
        names.sort();
        names
    }

    fn contains_store(&self, store: &str) -> bool {
        self.db.object_store_names().contains(store)
    }

    fn close(&self) {
        self.db.close();
    }

    async fn get_all(&self, store: &str) -> Result<Vec<Record>> {
        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readonly)?;

        let req = object_store
            .get_all()
            .map_err(|e| StoreError::from(crate::IndexedDbError::from(e)))?;

        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        Ok(js_array_to_records(&result)?)
    }

    async fn get(&self, store: &str, key: &Key) -> Result<Option<Record>> {
        key.validate()?;
        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readonly)?;

        let req = object_store
            .get(&key_to_js(key))
            .map_err(|e| StoreError::from(crate::IndexedDbError::from(e)))?;

        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        if result.is_undefined() {
            return Ok(None);
        }
        Ok(Some(js_to_record(&result)?))
    }

    async fn add(&self, store: &str, record: Record) -> Result<Key> {
        let js_val = record_to_js(&record)?;
        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readwrite)?;

        let req = object_store
            .add(&js_val)
            .map_err(|e| StoreError::from(crate::IndexedDbError::from(e)))?;

        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        Ok(js_to_key(&result)?)
    }

    async fn put(&self, store: &str, record: Record) -> Result<Key> {
        let js_val = record_to_js(&record)?;
        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readwrite)?;

        let req = object_store
            .put(&js_val)
            .map_err(|e| StoreError::from(crate::IndexedDbError::from(e)))?;

        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        Ok(js_to_key(&result)?)
    }

    async fn delete(&self, store: &str, key: &Key) -> Result<()> {
        key.validate()?;
        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readwrite)?;

        let req = object_store
            .delete(&key_to_js(key))
            .map_err(|e| StoreError::from(crate::IndexedDbError::from(e)))?;

        idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        Ok(())
    }
}
