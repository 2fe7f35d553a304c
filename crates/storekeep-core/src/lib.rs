//! Async versioned key-value storage client
//!
//! This crate turns a callback-driven storage engine (IndexedDB in the browser)
//! into a small async API: open a named, versioned database, create and drop
//! named stores, and read, insert, upsert and delete records.
//!
//! The [`StorageClient`] is generic over an [`Engine`]. [`MemoryEngine`] follows
//! IndexedDB's semantics in-process; the `storekeep-indexeddb` crate provides
//! the browser engine.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use storekeep_core::{StorageClient, StoreOptions};
//!
//! # tokio_test_block_on(async {
//! let client = StorageClient::in_memory("notes", 1);
//! client.open().await?;
//! client.create_store("items", StoreOptions::default()).await?;
//!
//! let key = client.add("items", json!({"text": "a"})).await?;
//! let record = client.get_by_id("items", key.clone()).await?;
//! assert_eq!(record, Some(json!({"id": 1, "text": "a"})));
//! # Ok::<(), storekeep_core::StoreError>(())
//! # }).unwrap();
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```
//!
//! # Schema changes
//!
//! Creating or deleting a store closes the current session and reopens the
//! database at `version + 1`. The client's configured version is not advanced
//! by this; see [`StorageClient::set_version`].

pub mod client;
pub mod engine;
pub mod error;
pub mod key;
pub mod memory;
pub mod options;
pub mod tracing;

/// A stored value. Usually a JSON object carrying the store's key path.
pub type Record = serde_json::Value;

pub use client::StorageClient;
pub use engine::{Engine, SchemaChange, Session};
pub use error::{ErrorKind, Result, StoreError};
pub use key::Key;
pub use memory::{MemoryEngine, MemorySession};
pub use options::{ClientConfig, StoreOptions};
