//! Store and client configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Key path used when none is configured.
pub const DEFAULT_KEY_PATH: &str = "id";

fn default_key_path() -> Option<String> {
    Some(DEFAULT_KEY_PATH.to_string())
}

fn default_auto_increment() -> bool {
    true
}

/// Configuration of a store, fixed when the store is created.
///
/// Deserializes from the same shape a browser caller would pass:
/// `{"keyPath": "id", "autoIncrement": true}`. A `null` key path makes the
/// store use out-of-line keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOptions {
    /// Dotted path of the primary-key field, or `None` for out-of-line keys
    #[serde(default = "default_key_path")]
    pub key_path: Option<String>,
    /// Whether the store generates keys for records that lack one
    #[serde(default = "default_auto_increment")]
    pub auto_increment: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            key_path: default_key_path(),
            auto_increment: default_auto_increment(),
        }
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    /// Keys are not stored inside records.
    ///
    /// Writes have no way to pass an explicit key, so an out-of-line store
    /// needs `auto_increment(true)`; without a generator every write fails
    /// with [`StoreError::Constraint`].
    pub fn out_of_line(mut self) -> Self {
        self.key_path = None;
        self
    }

    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    /// Check the combination is one a store can be created with.
    pub fn validate(&self) -> Result<()> {
        if self.auto_increment && self.key_path.as_deref() == Some("") {
            return Err(StoreError::Upgrade(
                "auto-increment store cannot use the empty key path".into(),
            ));
        }
        Ok(())
    }
}

/// Name and starting version of the database a client connects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

impl ClientConfig {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}
