//! Browser WASM bindings using wasm-bindgen
//!
//! Exposes [`StorageClient`] to JavaScript as the `IndexedDbClient` class.
//! Every method returns a Promise; rejections are `Error` objects whose
//! `name` is the error kind (`StateError`, `ConnectionError`,
//! `ConstraintError`, `NotFoundError`, `EngineError`).

use std::rc::Rc;

use js_sys::Promise;
use storekeep_core::{ErrorKind, StorageClient, StoreError, StoreOptions};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::convert::{js_to_key, js_to_record, key_to_js, record_to_js};
use crate::engine::IdbEngine;

/// Promise-based IndexedDB client for JavaScript callers.
#[wasm_bindgen(js_name = IndexedDbClient)]
pub struct JsStorageClient {
    inner: Rc<StorageClient<IdbEngine>>,
}

fn to_js_error(err: StoreError) -> JsValue {
    let name = match err.kind() {
        ErrorKind::State => "StateError",
        ErrorKind::Connection => "ConnectionError",
        ErrorKind::Constraint => "ConstraintError",
        ErrorKind::NotFound => "NotFoundError",
        ErrorKind::Engine => "EngineError",
    };
    let js_err = js_sys::Error::new(&err.to_string());
    js_err.set_name(name);
    js_err.into()
}

fn unit() -> Result<JsValue, JsValue> {
    Ok(JsValue::UNDEFINED)
}

#[wasm_bindgen(js_class = IndexedDbClient)]
impl JsStorageClient {
    #[wasm_bindgen(constructor)]
    pub fn new(db_name: String, version: u32) -> Result<JsStorageClient, JsValue> {
        // Route Rust panics to console.error instead of "RuntimeError: unreachable"
        console_error_panic_hook::set_once();

        let engine = IdbEngine::new().map_err(to_js_error)?;
        Ok(Self {
            inner: Rc::new(StorageClient::new(engine, db_name, version)),
        })
    }

    #[wasm_bindgen(getter, js_name = dbName)]
    pub fn db_name(&self) -> String {
        self.inner.name().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn version(&self) -> u32 {
        self.inner.version()
    }

    #[wasm_bindgen(setter)]
    pub fn set_version(&self, version: u32) {
        self.inner.set_version(version);
    }

    pub fn open(&self) -> Promise {
        let client = self.inner.clone();
        future_to_promise(async move {
            client.open().await.map_err(to_js_error)?;
            unit()
        })
    }

    pub fn close(&self) {
        self.inner.close();
    }

    #[wasm_bindgen(js_name = deleteDatabase)]
    pub fn delete_database(&self) -> Promise {
        let client = self.inner.clone();
        future_to_promise(async move {
            client.delete_database().await.map_err(to_js_error)?;
            unit()
        })
    }

    /// `options` may be omitted; missing fields take the defaults
    /// `{keyPath: "id", autoIncrement: true}`.
    #[wasm_bindgen(js_name = createStore)]
    pub fn create_store(&self, store: String, options: JsValue) -> Promise {
        let client = self.inner.clone();
        future_to_promise(async move {
            let options = if options.is_undefined() || options.is_null() {
                StoreOptions::default()
            } else {
                let value = js_to_record(&options)
                    .map_err(|e| to_js_error(StoreError::from(e)))?;
                serde_json::from_value(value)
                    .map_err(|e| to_js_error(StoreError::from(e)))?
            };
            client
                .create_store(&store, options)
                .await
                .map_err(to_js_error)?;
            unit()
        })
    }

    #[wasm_bindgen(js_name = deleteStore)]
    pub fn delete_store(&self, store: String) -> Promise {
        let client = self.inner.clone();
        future_to_promise(async move {
            client.delete_store(&store).await.map_err(to_js_error)?;
            unit()
        })
    }

    #[wasm_bindgen(js_name = getAll)]
    pub fn get_all(&self, store: String) -> Promise {
        let client = self.inner.clone();
        future_to_promise(async move {
            let records = client.get_all(&store).await.map_err(to_js_error)?;
            let array = js_sys::Array::new();
            for record in &records {
                let js_val = record_to_js(record).map_err(|e| to_js_error(e.into()))?;
                array.push(&js_val);
            }
            Ok(array.into())
        })
    }

    /// Resolves with `undefined` when no record has this key.
    #[wasm_bindgen(js_name = getById)]
    pub fn get_by_id(&self, store: String, id: JsValue) -> Promise {
        let client = self.inner.clone();
        future_to_promise(async move {
            let key = js_to_key(&id).map_err(|e| to_js_error(e.into()))?;
            match client.get_by_id(&store, key).await.map_err(to_js_error)? {
                Some(record) => record_to_js(&record).map_err(|e| to_js_error(e.into())),
                None => unit(),
            }
        })
    }

    /// Resolves with the new record's key.
    pub fn add(&self, store: String, data: JsValue) -> Promise {
        let client = self.inner.clone();
        future_to_promise(async move {
            let record = js_to_record(&data).map_err(|e| to_js_error(e.into()))?;
            let key = client.add(&store, record).await.map_err(to_js_error)?;
            Ok(key_to_js(&key))
        })
    }

    /// Resolves with the written record's key.
    pub fn update(&self, store: String, data: JsValue) -> Promise {
        let client = self.inner.clone();
        future_to_promise(async move {
            let record = js_to_record(&data).map_err(|e| to_js_error(e.into()))?;
            let key = client.update(&store, record).await.map_err(to_js_error)?;
            Ok(key_to_js(&key))
        })
    }

    pub fn delete(&self, store: String, id: JsValue) -> Promise {
        let client = self.inner.clone();
        future_to_promise(async move {
            let key = js_to_key(&id).map_err(|e| to_js_error(e.into()))?;
            client.delete(&store, key).await.map_err(to_js_error)?;
            unit()
        })
    }
}
