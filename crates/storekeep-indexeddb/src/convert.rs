//! JS <-> record and key conversion
//!
//! Records cross the boundary as JSON, so only JSON-representable values
//! survive a round trip through the browser engine.

use storekeep_core::{Key, Record};
use wasm_bindgen::prelude::*;

use crate::error::{IndexedDbError, Result};

/// Convert a record to a JS value via `JSON.parse`.
pub fn record_to_js(record: &Record) -> Result<JsValue> {
    let json = serde_json::to_string(record)?;
    Ok(js_sys::JSON::parse(&json)?)
}

/// Convert a JS value from IndexedDB back to a record via `JSON.stringify`.
pub fn js_to_record(val: &JsValue) -> Result<Record> {
    if val.is_undefined() {
        return Ok(Record::Null);
    }
    let json: String = js_sys::JSON::stringify(val)?.into();
    Ok(serde_json::from_str(&json)?)
}

/// Convert a JS array of stored values into records.
pub fn js_array_to_records(val: &JsValue) -> Result<Vec<Record>> {
    let array = js_sys::Array::from(val);
    let mut records = Vec::with_capacity(array.length() as usize);
    for i in 0..array.length() {
        records.push(js_to_record(&array.get(i))?);
    }
    Ok(records)
}

/// Convert a key to its JS form.
pub fn key_to_js(key: &Key) -> JsValue {
    match key {
        Key::Number(n) => JsValue::from_f64(*n),
        Key::String(s) => JsValue::from_str(s),
        Key::Array(items) => {
            let array = js_sys::Array::new_with_length(items.len() as u32);
            for (i, item) in items.iter().enumerate() {
                array.set(i as u32, key_to_js(item));
            }
            array.into()
        }
    }
}

/// Convert a JS key back. Date and binary keys are not supported.
pub fn js_to_key(val: &JsValue) -> Result<Key> {
    if let Some(n) = val.as_f64() {
        return Ok(Key::Number(n));
    }
    if let Some(s) = val.as_string() {
        return Ok(Key::String(s));
    }
    if js_sys::Array::is_array(val) {
        let array = js_sys::Array::from(val);
        let mut items = Vec::with_capacity(array.length() as usize);
        for i in 0..array.length() {
            items.push(js_to_key(&array.get(i))?);
        }
        return Ok(Key::Array(items));
    }
    Err(IndexedDbError::JsValue(format!(
        "unsupported key type: {:?}",
        val
    )))
}
