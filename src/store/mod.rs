//! Read side of the persisted key-value store the widget data is published to.
//!
//! The producer writes each value under one of several key spellings and with
//! either a 64-bit or a 32-bit integer encoding. Typed getters mirror a typed
//! preferences API: an absent key yields the caller's default, a key stored
//! with a different kind is a [`StoreError::TypeMismatch`].

mod memory;
mod migrations;
mod sqlite;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::{seed_sample_data, SqliteStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    Long,
    Int,
    String,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Long => "long",
            ValueKind::Int => "int",
            ValueKind::String => "string",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum StoreValue {
    Long(i64),
    Int(i32),
    String(String),
}

impl StoreValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            StoreValue::Long(_) => ValueKind::Long,
            StoreValue::Int(_) => ValueKind::Int,
            StoreValue::String(_) => ValueKind::String,
        }
    }
}

impl fmt::Display for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreValue::Long(value) => write!(f, "{value}"),
            StoreValue::Int(value) => write!(f, "{value}"),
            StoreValue::String(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key '{key}' holds a {found} value, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn mismatch(key: &str, expected: ValueKind, found: ValueKind) -> Self {
        StoreError::TypeMismatch {
            key: key.to_string(),
            expected,
            found,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only view of the preferences store.
pub trait KeyValueStore {
    fn contains(&self, key: &str) -> bool;

    fn get_i64(&self, key: &str, default: i64) -> StoreResult<i64>;

    fn get_i32(&self, key: &str, default: i32) -> StoreResult<i32>;

    fn get_string(&self, key: &str, default: &str) -> StoreResult<String>;

    /// Every entry in the store. Only used for diagnostics.
    fn get_all(&self) -> StoreResult<BTreeMap<String, StoreValue>>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn contains(&self, key: &str) -> bool {
        (**self).contains(key)
    }

    fn get_i64(&self, key: &str, default: i64) -> StoreResult<i64> {
        (**self).get_i64(key, default)
    }

    fn get_i32(&self, key: &str, default: i32) -> StoreResult<i32> {
        (**self).get_i32(key, default)
    }

    fn get_string(&self, key: &str, default: &str) -> StoreResult<String> {
        (**self).get_string(key, default)
    }

    fn get_all(&self) -> StoreResult<BTreeMap<String, StoreValue>> {
        (**self).get_all()
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn contains(&self, key: &str) -> bool {
        (**self).contains(key)
    }

    fn get_i64(&self, key: &str, default: i64) -> StoreResult<i64> {
        (**self).get_i64(key, default)
    }

    fn get_i32(&self, key: &str, default: i32) -> StoreResult<i32> {
        (**self).get_i32(key, default)
    }

    fn get_string(&self, key: &str, default: &str) -> StoreResult<String> {
        (**self).get_string(key, default)
    }

    fn get_all(&self) -> StoreResult<BTreeMap<String, StoreValue>> {
        (**self).get_all()
    }
}
