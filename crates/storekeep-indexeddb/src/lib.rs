//! IndexedDB engine for storekeep (browser WASM)
//!
//! This crate implements the `storekeep-core` [`Engine`](storekeep_core::Engine)
//! and [`Session`](storekeep_core::Session) traits on top of the browser's
//! IndexedDB, so a [`StorageClient`](storekeep_core::StorageClient) can run
//! unchanged in the browser.
//!
//! Records are stored as plain JS objects (converted through JSON). Store key
//! paths and auto-increment map directly onto IndexedDB object store
//! parameters, and every engine error is forwarded with its DOMException name
//! mapped onto [`StoreError`](storekeep_core::StoreError).
//!
//! With the `browser` feature the crate also exports an `IndexedDbClient`
//! class to JavaScript whose methods return Promises.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use storekeep_core::{StorageClient, StoreOptions};
//! use storekeep_indexeddb::IdbEngine;
//!
//! let client = StorageClient::new(IdbEngine::new()?, "notes", 1);
//! client.open().await?;
//! client.create_store("items", StoreOptions::default()).await?;
//!
//! let key = client.add("items", json!({"text": "a"})).await?;
//! let record = client.get_by_id("items", key).await?;
//! assert!(record.is_some());
//! ```
//!
//! The crate is empty on non-wasm32 targets.

#![cfg(target_arch = "wasm32")]

pub mod convert;
pub mod engine;
pub mod error;
pub mod idb;

#[cfg(feature = "browser")]
pub mod bindings;

pub use engine::{IdbEngine, IdbSession};
pub use error::{IndexedDbError, Result};
