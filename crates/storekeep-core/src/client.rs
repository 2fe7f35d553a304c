//! Stateful storage client wrapping one logical database connection.
//!
//! The current session lives in a replaceable slot. Every operation reads the
//! slot immediately before use, because [`StorageClient::create_store`] and
//! [`StorageClient::delete_store`] close the session and put a new one in its
//! place.
//!
//! Record operations racing with a store mutation on the same client are not
//! fenced: the racing operation may observe the old session (and fail because
//! it is closed) or the new one.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::engine::{Engine, SchemaChange, Session};
use crate::error::{Result, StoreError};
use crate::key::Key;
use crate::memory::MemoryEngine;
use crate::options::{ClientConfig, StoreOptions};
use crate::tracing::prefix;
use crate::Record;

/// Async client for one named, versioned database.
///
/// Constructed closed; call [`open`](Self::open) before anything else.
/// Every connection-bound operation on a closed client fails with
/// [`StoreError::State`].
pub struct StorageClient<E: Engine> {
    engine: E,
    name: String,
    version: AtomicU32,
    session: RwLock<Option<E::Session>>,
}

impl StorageClient<MemoryEngine> {
    /// Client backed by a fresh in-memory engine.
    pub fn in_memory(name: impl Into<String>, version: u32) -> Self {
        Self::new(MemoryEngine::new(), name, version)
    }
}

impl<E: Engine> StorageClient<E> {
    pub fn new(engine: E, name: impl Into<String>, version: u32) -> Self {
        Self {
            engine,
            name: name.into(),
            version: AtomicU32::new(version),
            session: RwLock::new(None),
        }
    }

    pub fn from_config(engine: E, config: &ClientConfig) -> Self {
        Self::new(engine, config.name.clone(), config.version)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured version. Not advanced by store mutations.
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    /// Change the configured version used by `open` and as the base of the
    /// next store mutation (which opens at `version + 1`).
    pub fn set_version(&self, version: u32) {
        self.version.store(version, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.session.read().is_some()
    }

    /// Version of the session currently held, if any.
    pub fn session_version(&self) -> Option<u32> {
        self.session.read().as_ref().map(|s| s.version())
    }

    /// Store names visible to the current session.
    pub fn store_names(&self) -> Result<Vec<String>> {
        Ok(self.current()?.store_names())
    }

    /// Open (or create) the database at the configured name and version.
    ///
    /// A client that already holds a session keeps it.
    pub async fn open(&self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let session = self.engine.open(&self.name, self.version(), None).await?;
        debug!(
            "{} opened '{}' at version {}",
            prefix::DB,
            self.name,
            session.version()
        );
        self.hold(session);
        Ok(())
    }

    /// Close and drop the current session. Closing a closed client is a no-op.
    pub fn close(&self) {
        if let Some(session) = self.replace(None) {
            session.close();
            debug!("{} closed '{}'", prefix::DB, self.name);
        }
    }

    /// Remove the database and all its stores.
    ///
    /// The client's own session counts as a blocker: [`close`](Self::close)
    /// first. It is rejected here, before any request reaches the engine, so
    /// a blocked delete is never left queued behind our own connection.
    pub async fn delete_database(&self) -> Result<()> {
        if self.is_open() {
            return Err(StoreError::Blocked(format!(
                "database '{}' is open on this client",
                self.name
            )));
        }
        self.engine.delete_database(&self.name).await?;
        debug!("{} deleted '{}'", prefix::DB, self.name);
        Ok(())
    }

    /// Create a store. Succeeds without doing anything if it already exists.
    pub async fn create_store(&self, store: &str, options: StoreOptions) -> Result<()> {
        let current = self.current()?;
        if current.contains_store(store) {
            return Ok(());
        }

        self.upgrade(current, SchemaChange::create_store(store, options))
            .await
    }

    /// Delete a store.
    ///
    /// A store the current session does not know fails with
    /// [`StoreError::Upgrade`] and leaves the session untouched.
    pub async fn delete_store(&self, store: &str) -> Result<()> {
        let current = self.current()?;
        if !current.contains_store(store) {
            return Err(StoreError::Upgrade(format!(
                "no object store named '{}'",
                store
            )));
        }

        self.upgrade(current, SchemaChange::delete_store(store))
            .await
    }

    /// All records in primary-key order.
    pub async fn get_all(&self, store: &str) -> Result<Vec<Record>> {
        self.current()?.get_all(store).await
    }

    /// The record stored under `id`, or `None`.
    pub async fn get_by_id(&self, store: &str, id: impl Into<Key>) -> Result<Option<Record>> {
        self.current()?.get(store, &id.into()).await
    }

    /// Insert a new record and return its key.
    pub async fn add(&self, store: &str, data: Record) -> Result<Key> {
        self.current()?.add(store, data).await
    }

    /// Insert or overwrite the record with `data`'s key and return that key.
    pub async fn update(&self, store: &str, data: Record) -> Result<Key> {
        self.current()?.put(store, data).await
    }

    /// Remove the record stored under `id`. Absent records are not an error.
    pub async fn delete(&self, store: &str, id: impl Into<Key>) -> Result<()> {
        self.current()?.delete(store, &id.into()).await
    }

    /// [`get_all`](Self::get_all), deserializing each record.
    pub async fn get_all_as<T: DeserializeOwned>(&self, store: &str) -> Result<Vec<T>> {
        self.get_all(store)
            .await?
            .into_iter()
            .map(|record| serde_json::from_value(record).map_err(StoreError::from))
            .collect()
    }

    /// [`get_by_id`](Self::get_by_id), deserializing the record.
    pub async fn get_by_id_as<T: DeserializeOwned>(
        &self,
        store: &str,
        id: impl Into<Key>,
    ) -> Result<Option<T>> {
        match self.get_by_id(store, id).await? {
            Some(record) => Ok(Some(serde_json::from_value(record)?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn current(&self) -> Result<E::Session> {
        self.session.read().clone().ok_or_else(StoreError::not_open)
    }

    fn replace(&self, session: Option<E::Session>) -> Option<E::Session> {
        std::mem::replace(&mut *self.session.write(), session)
    }

    /// Put `session` in the slot, closing any session it displaces.
    fn hold(&self, session: E::Session) {
        if let Some(old) = self.replace(Some(session)) {
            old.close();
        }
    }

    /// Close `current`, reopen at `version + 1` applying `change`, and hold
    /// the new session. On failure the slot is left empty.
    ///
    /// If the database already sits at `version + 1` the reopen runs no
    /// upgrade. The new session is still held but the call fails with
    /// [`StoreError::Version`] since `change` was not applied.
    async fn upgrade(&self, current: E::Session, change: SchemaChange) -> Result<()> {
        let target = self
            .version()
            .checked_add(1)
            .ok_or_else(|| StoreError::Version("version overflow".into()))?;
        let previous = current.version();

        current.close();
        self.replace(None);

        debug!(
            "{} {:?} on '{}' at version {}",
            prefix::UPGRADE,
            change,
            self.name,
            target
        );
        let session = self.engine.open(&self.name, target, Some(&change)).await?;
        let reached = session.version();
        self.hold(session);

        if reached == previous {
            return Err(StoreError::Version(format!(
                "database already at version {}; advance with set_version",
                reached
            )));
        }
        Ok(())
    }
}
