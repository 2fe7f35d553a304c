//! Record keys and key paths
//!
//! Keys follow IndexedDB's comparison rules: every number sorts before every
//! string, every string before every array. Arrays compare element-wise and
//! then by length. Only JSON-representable key types are supported, so dates
//! and binary keys are absent.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Highest value the key generator may hand out (2^53).
pub const MAX_GENERATED_KEY: f64 = 9_007_199_254_740_992.0;

/// Primary-key value of a record.
#[derive(Debug, Clone)]
pub enum Key {
    Number(f64),
    String(String),
    Array(Vec<Key>),
}

impl Key {
    /// Read a key out of a JSON value. Returns `None` for values that are not
    /// valid keys (null, booleans, objects, non-finite numbers).
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Number(n) => n.as_f64().filter(|f| !f.is_nan()).map(Key::Number),
            Value::String(s) => Some(Key::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
            _ => None,
        }
    }

    /// Convert to JSON. Integral numbers become JSON integers so that a
    /// generated key `1` compares equal to `json!(1)`.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Number(n) => {
                if n.fract() == 0.0 && n.abs() <= MAX_GENERATED_KEY {
                    Value::from(*n as i64)
                } else {
                    Value::from(*n)
                }
            }
            Key::String(s) => Value::String(s.clone()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_value).collect()),
        }
    }

    /// Reject keys the engine would refuse (NaN anywhere in the key).
    pub fn validate(&self) -> Result<()> {
        match self {
            Key::Number(n) if n.is_nan() => {
                Err(StoreError::Constraint("NaN is not a valid key".into()))
            }
            Key::Array(items) => items.iter().try_for_each(Key::validate),
            _ => Ok(()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Key::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Number(_) => 0,
            Key::String(_) => 1,
            Key::Array(_) => 2,
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Number(a), Key::Number(b)) => {
                // -0 and +0 are the same key
                if a == b {
                    Ordering::Equal
                } else {
                    a.total_cmp(b)
                }
            }
            (Key::String(a), Key::String(b)) => a.encode_utf16().cmp(b.encode_utf16()),
            (Key::Array(a), Key::Array(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

macro_rules! number_key {
    ($($t:ty),*) => {
        $(impl From<$t> for Key {
            fn from(n: $t) -> Self {
                Key::Number(n as f64)
            }
        })*
    };
}

number_key!(i32, i64, u32, u64, usize, f64);

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::String(s)
    }
}

impl From<Vec<Key>> for Key {
    fn from(items: Vec<Key>) -> Self {
        Key::Array(items)
    }
}

// ============================================================================
// Key paths
// ============================================================================

/// Look up the value at a dotted key path. The empty path is the record itself.
pub fn extract<'a>(record: &'a Value, key_path: &str) -> Option<&'a Value> {
    if key_path.is_empty() {
        return Some(record);
    }
    key_path
        .split('.')
        .try_fold(record, |value, segment| value.as_object()?.get(segment))
}

/// Read the key stored at `key_path`.
///
/// `Ok(None)` means the record has no value there; a value that is present
/// but not a valid key is a constraint error.
pub fn extract_key(record: &Value, key_path: &str) -> Result<Option<Key>> {
    match extract(record, key_path) {
        None => Ok(None),
        Some(value) => Key::from_value(value).map(Some).ok_or_else(|| {
            StoreError::Constraint(format!(
                "value at key path '{}' is not a valid key: {}",
                key_path, value
            ))
        }),
    }
}

/// Write a generated key into the record at `key_path`, creating
/// intermediate objects as needed.
pub fn inject_key(record: &mut Value, key_path: &str, key: &Key) -> Result<()> {
    let mut segments: Vec<&str> = key_path.split('.').collect();
    let last = segments
        .pop()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StoreError::Constraint("cannot inject a key at the empty key path".into()))?;

    let mut current = record;
    for segment in segments {
        let obj = current.as_object_mut().ok_or_else(|| not_an_object(key_path))?;
        current = obj
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let obj = current.as_object_mut().ok_or_else(|| not_an_object(key_path))?;
    obj.insert(last.to_string(), key.to_value());
    Ok(())
}

fn not_an_object(key_path: &str) -> StoreError {
    StoreError::Constraint(format!(
        "cannot inject key at '{}': record is not an object",
        key_path
    ))
}
