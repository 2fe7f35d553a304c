//! In-memory storage engine
//!
//! A HashMap-of-BTreeMaps engine that follows IndexedDB's rules for
//! versioning, upgrades, key paths and key generators. Useful for:
//! - Unit and integration testing
//! - Native processes that want the same client API without a browser
//!
//! Data lives as long as the engine (and its clones) do; nothing is persisted.
//!
//! Where IndexedDB would fire `blocked` and wait for other connections to
//! close, this engine fails the request immediately with
//! [`StoreError::Blocked`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::engine::{Engine, SchemaChange, Session};
use crate::error::{Result, StoreError};
use crate::key::{extract_key, inject_key, Key, MAX_GENERATED_KEY};
use crate::options::StoreOptions;
use crate::tracing::prefix;
use crate::Record;

type Databases = Arc<Mutex<HashMap<String, MemoryDatabase>>>;

/// In-memory storage engine.
///
/// Clones share the same databases, so two clients built from clones of one
/// engine see each other's data, like two tabs on one origin.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    databases: Databases,
}

impl MemoryEngine {
    /// Create an engine with no databases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all existing databases, sorted.
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stored version of a database, if it exists.
    pub fn database_version(&self, name: &str) -> Option<u32> {
        self.databases.lock().get(name).map(|db| db.version)
    }

    /// Number of open sessions on a database.
    pub fn open_sessions(&self, name: &str) -> usize {
        self.databases
            .lock()
            .get(name)
            .map(|db| db.connections)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryDatabase {
    version: u32,
    stores: BTreeMap<String, MemoryObjectStore>,
    connections: usize,
}

impl MemoryDatabase {
    fn apply(&mut self, change: &SchemaChange) -> Result<()> {
        match change {
            SchemaChange::CreateStore { name, options } => {
                if self.stores.contains_key(name) {
                    return Err(StoreError::Upgrade(format!(
                        "object store '{}' already exists",
                        name
                    )));
                }
                options.validate()?;
                self.stores
                    .insert(name.clone(), MemoryObjectStore::new(options.clone()));
            }
            SchemaChange::DeleteStore { name } => {
                if self.stores.remove(name).is_none() {
                    return Err(StoreError::Upgrade(format!(
                        "no object store named '{}'",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MemoryObjectStore {
    options: StoreOptions,
    records: BTreeMap<Key, Record>,
    /// Next value the key generator hands out
    next_key: f64,
}

impl MemoryObjectStore {
    fn new(options: StoreOptions) -> Self {
        Self {
            options,
            records: BTreeMap::new(),
            next_key: 1.0,
        }
    }

    fn generate(&self) -> Result<(Key, f64)> {
        if self.next_key > MAX_GENERATED_KEY {
            return Err(StoreError::Constraint("key generator exhausted".into()));
        }
        let next_key = if self.next_key >= MAX_GENERATED_KEY {
            f64::INFINITY
        } else {
            self.next_key + 1.0
        };
        Ok((Key::Number(self.next_key), next_key))
    }

    /// Generator value after an explicit key has been written.
    fn observe(&self, key: &Key) -> f64 {
        match key.as_f64() {
            Some(n) if self.options.auto_increment && n >= self.next_key => {
                if n.floor() >= MAX_GENERATED_KEY {
                    f64::INFINITY
                } else {
                    n.floor() + 1.0
                }
            }
            _ => self.next_key,
        }
    }

    /// Resolve the record's key and store it. Generator state only advances
    /// when the write succeeds.
    fn write(&mut self, mut record: Record, overwrite: bool) -> Result<Key> {
        let (key, next_key) = match self.options.key_path.clone() {
            Some(path) => match extract_key(&record, &path)? {
                Some(key) => {
                    key.validate()?;
                    let next_key = self.observe(&key);
                    (key, next_key)
                }
                None if self.options.auto_increment => {
                    let (key, next_key) = self.generate()?;
                    inject_key(&mut record, &path, &key)?;
                    (key, next_key)
                }
                None => {
                    return Err(StoreError::Constraint(format!(
                        "record has no value at key path '{}' and the store has no key generator",
                        path
                    )))
                }
            },
            None if self.options.auto_increment => self.generate()?,
            None => {
                return Err(StoreError::Constraint(
                    "store uses out-of-line keys without a key generator".into(),
                ))
            }
        };

        if !overwrite && self.records.contains_key(&key) {
            return Err(StoreError::Constraint(format!(
                "a record with key {} already exists",
                key
            )));
        }

        self.records.insert(key.clone(), record);
        self.next_key = next_key;
        Ok(key)
    }
}

#[async_trait(?Send)]
impl Engine for MemoryEngine {
    type Session = MemorySession;

    async fn open(
        &self,
        name: &str,
        version: u32,
        change: Option<&SchemaChange>,
    ) -> Result<MemorySession> {
        if version == 0 {
            return Err(StoreError::Version(
                "version must be greater than zero".into(),
            ));
        }

        let mut databases = self.databases.lock();
        let existing = databases.get(name);
        let stored = existing.map(|db| db.version).unwrap_or(0);

        if stored > version {
            return Err(StoreError::Version(format!(
                "requested version {} is lower than stored version {} of '{}'",
                version, stored, name
            )));
        }

        if stored < version {
            if let Some(db) = existing {
                if db.connections > 0 {
                    return Err(StoreError::Blocked(format!(
                        "upgrade of '{}' to version {} blocked by {} open session(s)",
                        name, version, db.connections
                    )));
                }
            }

            // Upgrade runs on a copy so an aborted change leaves nothing behind
            let mut upgraded = existing.cloned().unwrap_or_default();
            if let Some(change) = change {
                upgraded.apply(change)?;
            }
            upgraded.version = version;
            debug!(
                "{} upgraded '{}' from version {} to {}",
                prefix::DB,
                name,
                stored,
                version
            );
            databases.insert(name.to_string(), upgraded);
        }

        let db = databases
            .get_mut(name)
            .ok_or_else(|| StoreError::Backend(format!("database '{}' vanished", name)))?;
        db.connections += 1;

        trace!("{} opened session on '{}' v{}", prefix::DB, name, version);

        Ok(MemorySession {
            inner: Arc::new(SessionInner {
                databases: self.databases.clone(),
                name: name.to_string(),
                version,
                store_names: db.stores.keys().cloned().collect(),
                closed: AtomicBool::new(false),
            }),
        })
    }

    async fn delete_database(&self, name: &str) -> Result<()> {
        let mut databases = self.databases.lock();
        if let Some(db) = databases.get(name) {
            if db.connections > 0 {
                return Err(StoreError::Blocked(format!(
                    "deletion of '{}' blocked by {} open session(s)",
                    name, db.connections
                )));
            }
        }
        if databases.remove(name).is_some() {
            debug!("{} deleted database '{}'", prefix::DB, name);
        }
        Ok(())
    }
}

/// Open session on a [`MemoryEngine`] database.
///
/// Dropping the last clone closes the session.
#[derive(Debug, Clone)]
pub struct MemorySession {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    databases: Databases,
    name: String,
    version: u32,
    store_names: Vec<String>,
    closed: AtomicBool,
}

impl SessionInner {
    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(db) = self.databases.lock().get_mut(&self.name) {
            db.connections = db.connections.saturating_sub(1);
        }
        trace!("{} closed session on '{}' v{}", prefix::DB, self.name, self.version);
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.close();
    }
}

impl MemorySession {
    /// Run `f` against a store inside the engine lock.
    fn with_store<T>(
        &self,
        store: &str,
        f: impl FnOnce(&mut MemoryObjectStore) -> Result<T>,
    ) -> Result<T> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(StoreError::State("database connection is closed".into()));
        }

        let mut databases = self.inner.databases.lock();
        let object_store = databases
            .get_mut(&self.inner.name)
            .and_then(|db| db.stores.get_mut(store))
            .ok_or_else(|| StoreError::NotFound(format!("object store '{}'", store)))?;
        f(object_store)
    }
}

#[async_trait(?Send)]
impl Session for MemorySession {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn version(&self) -> u32 {
        self.inner.version
    }

    fn store_names(&self) -> Vec<String> {
        self.inner.store_names.clone()
    }

    fn close(&self) {
        self.inner.close();
    }

    async fn get_all(&self, store: &str) -> Result<Vec<Record>> {
        self.with_store(store, |s| Ok(s.records.values().cloned().collect()))
    }

    async fn get(&self, store: &str, key: &Key) -> Result<Option<Record>> {
        key.validate()?;
        self.with_store(store, |s| Ok(s.records.get(key).cloned()))
    }

    async fn add(&self, store: &str, record: Record) -> Result<Key> {
        self.with_store(store, |s| s.write(record, false))
    }

    async fn put(&self, store: &str, record: Record) -> Result<Key> {
        self.with_store(store, |s| s.write(record, true))
    }

    async fn delete(&self, store: &str, key: &Key) -> Result<()> {
        key.validate()?;
        self.with_store(store, |s| {
            s.records.remove(key);
            Ok(())
        })
    }
}
