//! Storage engine abstraction
//!
//! An [`Engine`] opens versioned databases and deletes them; the [`Session`]
//! it hands back runs single-request transactions against named stores.
//! Implementations exist for:
//!
//! - **Memory**: in-process engine for native use and testing (`MemoryEngine`)
//! - **IndexedDB**: browser storage via web-sys (`storekeep-indexeddb`, WASM only)
//!
//! The traits are `?Send` because browser handles are bound to the JS thread.

use async_trait::async_trait;

use crate::error::Result;
use crate::key::Key;
use crate::options::StoreOptions;
use crate::Record;

/// Schema change applied during the upgrade step of an open request.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    CreateStore { name: String, options: StoreOptions },
    DeleteStore { name: String },
}

impl SchemaChange {
    pub fn create_store(name: impl Into<String>, options: StoreOptions) -> Self {
        SchemaChange::CreateStore {
            name: name.into(),
            options,
        }
    }

    pub fn delete_store(name: impl Into<String>) -> Self {
        SchemaChange::DeleteStore { name: name.into() }
    }
}

/// Factory side of a storage engine.
#[async_trait(?Send)]
pub trait Engine {
    type Session: Session;

    /// Open (or create) `name` at `version`.
    ///
    /// When the stored version is lower than `version` an upgrade runs and
    /// `change` is applied inside it. A failed change aborts the upgrade and
    /// leaves the database at its previous version. When the versions are
    /// equal no upgrade runs and `change` is ignored.
    async fn open(
        &self,
        name: &str,
        version: u32,
        change: Option<&SchemaChange>,
    ) -> Result<Self::Session>;

    /// Remove a database and every store in it. Succeeds if it does not exist.
    async fn delete_database(&self, name: &str) -> Result<()>;
}

/// An open connection to one database at one version.
///
/// Sessions are cheap handles; clones refer to the same connection.
#[async_trait(?Send)]
pub trait Session: Clone {
    fn name(&self) -> &str;

    fn version(&self) -> u32;

    /// Store names as of the moment the session was opened, sorted.
    fn store_names(&self) -> Vec<String>;

    fn contains_store(&self, store: &str) -> bool {
        self.store_names().iter().any(|s| s == store)
    }

    /// Close the connection. Closing twice is harmless.
    fn close(&self);

    /// All records in primary-key order.
    async fn get_all(&self, store: &str) -> Result<Vec<Record>>;

    async fn get(&self, store: &str, key: &Key) -> Result<Option<Record>>;

    /// Insert a new record, returning its key.
    async fn add(&self, store: &str, record: Record) -> Result<Key>;

    /// Insert or overwrite a record, returning its key.
    async fn put(&self, store: &str, record: Record) -> Result<Key>;

    async fn delete(&self, store: &str, key: &Key) -> Result<()>;
}
