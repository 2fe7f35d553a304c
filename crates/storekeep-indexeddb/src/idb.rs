//! Low-level IndexedDB helpers using web-sys
//!
//! Wraps the callback-based IndexedDB API into Rust futures using
//! `wasm_bindgen_futures::JsFuture` and `js_sys::Promise`. Each request
//! becomes a promise that settles exactly once; the error branch carries the
//! request's DOMException unchanged.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use js_sys::Promise;
use storekeep_core::{SchemaChange, StoreError};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    IdbDatabase, IdbFactory, IdbObjectStore, IdbOpenDbRequest, IdbRequest, IdbTransaction,
    IdbTransactionMode,
};

use crate::error::{IndexedDbError, Result, BLOCKED_ERROR};

type EventClosure = Closure<dyn FnMut(web_sys::Event)>;

/// Handlers of one open/delete request, kept alive until it settles.
struct OpenHandlers {
    _upgrade: Closure<dyn FnMut(web_sys::IdbVersionChangeEvent)>,
    _success: EventClosure,
    _error: EventClosure,
    _blocked: EventClosure,
}

/// Get the global IndexedDB factory.
pub fn idb_factory() -> Result<IdbFactory> {
    let global = js_sys::global();

    let idb: JsValue = js_sys::Reflect::get(&global, &"indexedDB".into())
        .map_err(|_| IndexedDbError::NotAvailable("no indexedDB on global".into()))?;

    if idb.is_undefined() || idb.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "indexedDB is null/undefined".into(),
        ));
    }

    idb.dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("indexedDB is not IdbFactory".into()))
}

/// The DOMException of a failed request, as a JsValue.
fn request_error(req: &IdbRequest) -> JsValue {
    match req.error() {
        Ok(Some(e)) => e.into(),
        _ => JsValue::from_str("unknown IDB error"),
    }
}

/// Convert an IdbRequest into a JS Promise that resolves with the request's result.
fn request_to_promise(req: &IdbRequest) -> Promise {
    let req_success = req.clone();
    let req_error = req.clone();

    Promise::new(&mut move |resolve, reject| {
        // Store closures in Rc<RefCell> to manage their lifetime without leaking
        let closures: Rc<RefCell<Option<(EventClosure, EventClosure)>>> =
            Rc::new(RefCell::new(None));

        let req_s = req_success.clone();
        let closures_for_success = closures.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let result = req_s.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            *closures_for_success.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = req_error.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = reject.call1(&JsValue::UNDEFINED, &request_error(&req_e));
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        req_success.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_success, on_error));
    })
}

/// Convert an IdbTransaction completion into a JS Promise.
fn transaction_to_promise(tx: &IdbTransaction) -> Promise {
    let tx_complete = tx.clone();
    let tx_error = tx.clone();

    Promise::new(&mut move |resolve, reject| {
        let closures: Rc<RefCell<Option<(EventClosure, EventClosure)>>> =
            Rc::new(RefCell::new(None));

        let closures_for_complete = closures.clone();
        let on_complete = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = resolve.call0(&JsValue::UNDEFINED);
            *closures_for_complete.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let tx_e = tx_error.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let err = tx_e
                .error()
                .map(JsValue::from)
                .unwrap_or_else(|| JsValue::from_str("transaction error"));
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        tx_complete.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_complete, on_error));
    })
}

/// Apply a schema change to a database inside its upgrade transaction.
fn apply_change(db: &IdbDatabase, change: &SchemaChange) -> std::result::Result<(), StoreError> {
    match change {
        SchemaChange::CreateStore { name, options } => {
            options.validate()?;
            let params = web_sys::IdbObjectStoreParameters::new();
            if let Some(key_path) = &options.key_path {
                js_sys::Reflect::set(&params, &"keyPath".into(), &key_path.into())
                    .map_err(|e| StoreError::from(IndexedDbError::from(e)))?;
            }
            js_sys::Reflect::set(
                &params,
                &"autoIncrement".into(),
                &JsValue::from_bool(options.auto_increment),
            )
            .map_err(|e| StoreError::from(IndexedDbError::from(e)))?;

            db.create_object_store_with_optional_parameters(name, &params)
                .map(|_| ())
                .map_err(|e| StoreError::Upgrade(IndexedDbError::from(e).to_string()))
        }
        SchemaChange::DeleteStore { name } => db
            .delete_object_store(name)
            .map_err(|e| StoreError::Upgrade(IndexedDbError::from(e).to_string())),
    }
}

/// Drive an open or delete request until it settles.
///
/// `blocked` rejects immediately. If the request later unblocks, its upgrade
/// is aborted and any connection it produces is closed.
async fn run_open_request(
    open_req: IdbOpenDbRequest,
    change: Option<SchemaChange>,
) -> std::result::Result<JsValue, StoreError> {
    let blocked = Rc::new(Cell::new(false));
    let upgrade_error: Rc<RefCell<Option<StoreError>>> = Rc::new(RefCell::new(None));

    let promise = Promise::new(&mut |resolve, reject| {
        let handlers: Rc<RefCell<Option<OpenHandlers>>> = Rc::new(RefCell::new(None));

        // Handle upgradeneeded: apply the schema change or abort
        let req_u = open_req.clone();
        let blocked_u = blocked.clone();
        let upgrade_error_u = upgrade_error.clone();
        let change_u = change.clone();
        let on_upgrade = Closure::wrap(Box::new(move |_event: web_sys::IdbVersionChangeEvent| {
            let tx = req_u.transaction();
            let abort = || {
                if let Some(tx) = &tx {
                    let _ = tx.abort();
                }
            };
            if blocked_u.get() {
                abort();
                return;
            }
            let db: IdbDatabase = match req_u.result() {
                Ok(val) => val.unchecked_into(),
                Err(_) => return,
            };
            if let Some(change) = &change_u {
                if let Err(e) = apply_change(&db, change) {
                    *upgrade_error_u.borrow_mut() = Some(e);
                    abort();
                }
            }
        }) as Box<dyn FnMut(web_sys::IdbVersionChangeEvent)>);

        let req_s = open_req.clone();
        let blocked_s = blocked.clone();
        let handlers_for_success = handlers.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let result = req_s.result().unwrap_or(JsValue::UNDEFINED);
            if blocked_s.get() {
                // Caller already saw the failure; don't leak the connection
                if let Ok(db) = result.dyn_into::<IdbDatabase>() {
                    db.close();
                }
            } else {
                let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            }
            *handlers_for_success.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = open_req.clone();
        let reject_e = reject.clone();
        let handlers_for_error = handlers.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let err = request_error(&req_e);
            let _ = reject_e.call1(&JsValue::UNDEFINED, &err);
            *handlers_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        // Handlers stay registered after blocked so a late unblock is cleaned up
        let blocked_b = blocked.clone();
        let on_blocked = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            blocked_b.set(true);
            let err = js_sys::Error::new("request blocked by another open connection");
            err.set_name(BLOCKED_ERROR);
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
        }) as Box<dyn FnMut(web_sys::Event)>);

        open_req.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));
        open_req.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        open_req.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        open_req.set_onblocked(Some(on_blocked.as_ref().unchecked_ref()));

        *handlers.borrow_mut() = Some(OpenHandlers {
            _upgrade: on_upgrade,
            _success: on_success,
            _error: on_error,
            _blocked: on_blocked,
        });
    });

    match wasm_bindgen_futures::JsFuture::from(promise).await {
        Ok(result) => Ok(result),
        // The change's own error explains an aborted upgrade better than AbortError
        Err(e) => Err(upgrade_error
            .borrow_mut()
            .take()
            .unwrap_or_else(|| IndexedDbError::from(e).into())),
    }
}

/// Open (or create) a database at `version`, applying `change` if an upgrade runs.
pub async fn open_database(
    factory: &IdbFactory,
    db_name: &str,
    version: u32,
    change: Option<&SchemaChange>,
) -> std::result::Result<IdbDatabase, StoreError> {
    if version == 0 {
        return Err(StoreError::Version(
            "version must be greater than zero".into(),
        ));
    }

    let open_req = factory
        .open_with_u32(db_name, version)
        .map_err(|e| StoreError::from(IndexedDbError::from(e)))?;

    let result = run_open_request(open_req, change.cloned()).await?;

    result
        .dyn_into::<IdbDatabase>()
        .map_err(|_| StoreError::Backend("open result is not IdbDatabase".into()))
}

/// Delete an IndexedDB database by name.
pub async fn delete_database(
    factory: &IdbFactory,
    db_name: &str,
) -> std::result::Result<(), StoreError> {
    let req = factory
        .delete_database(db_name)
        .map_err(|e| StoreError::from(IndexedDbError::from(e)))?;
    run_open_request(req, None).await?;
    Ok(())
}

/// Start a single-store transaction.
pub fn begin_transaction(
    db: &IdbDatabase,
    store: &str,
    mode: IdbTransactionMode,
) -> Result<(IdbTransaction, IdbObjectStore)> {
    let tx = db.transaction_with_str_and_mode(store, mode)?;
    let object_store = tx.object_store(store)?;
    Ok((tx, object_store))
}

/// Await an IdbRequest, resolving to its result JsValue.
pub async fn await_request(req: &IdbRequest) -> Result<JsValue> {
    let promise = request_to_promise(req);
    Ok(wasm_bindgen_futures::JsFuture::from(promise).await?)
}

/// Await an IdbTransaction to complete.
pub async fn await_transaction(tx: &IdbTransaction) -> Result<()> {
    let promise = transaction_to_promise(tx);
    wasm_bindgen_futures::JsFuture::from(promise).await?;
    Ok(())
}
