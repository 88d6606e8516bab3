use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{KeyValueStore, StoreError, StoreResult, StoreValue, ValueKind};

/// In-memory store, used by tests and by hosts that hand over a snapshot of
/// their preferences instead of a live handle.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, StoreValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, StoreValue)>,
        K: Into<String>,
    {
        let data = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();
        Self {
            data: RwLock::new(data),
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: StoreValue) {
        self.write().insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<StoreValue> {
        self.write().remove(key)
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, StoreValue>> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, StoreValue>> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    fn get_i64(&self, key: &str, default: i64) -> StoreResult<i64> {
        match self.read().get(key) {
            None => Ok(default),
            Some(StoreValue::Long(value)) => Ok(*value),
            Some(other) => Err(StoreError::mismatch(key, ValueKind::Long, other.kind())),
        }
    }

    fn get_i32(&self, key: &str, default: i32) -> StoreResult<i32> {
        match self.read().get(key) {
            None => Ok(default),
            Some(StoreValue::Int(value)) => Ok(*value),
            Some(other) => Err(StoreError::mismatch(key, ValueKind::Int, other.kind())),
        }
    }

    fn get_string(&self, key: &str, default: &str) -> StoreResult<String> {
        match self.read().get(key) {
            None => Ok(default.to_string()),
            Some(StoreValue::String(value)) => Ok(value.clone()),
            Some(other) => Err(StoreError::mismatch(key, ValueKind::String, other.kind())),
        }
    }

    fn get_all(&self) -> StoreResult<BTreeMap<String, StoreValue>> {
        Ok(self.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_key_returns_default() {
        let store = MemoryStore::new();
        assert!(!store.contains("missing"));
        assert_eq!(store.get_i64("missing", 7).unwrap(), 7);
        assert_eq!(store.get_i32("missing", -1).unwrap(), -1);
        assert_eq!(store.get_string("missing", "--").unwrap(), "--");
    }

    #[test]
    fn typed_getters_reject_other_kinds() {
        let store = MemoryStore::from_entries([("goal", StoreValue::Int(1800))]);

        assert_eq!(store.get_i32("goal", 0).unwrap(), 1800);
        match store.get_i64("goal", 0) {
            Err(StoreError::TypeMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, ValueKind::Long);
                assert_eq!(found, ValueKind::Int);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
        assert!(store.get_string("goal", "").is_err());
    }

    #[test]
    fn insert_and_remove_are_visible() {
        let store = MemoryStore::new();
        store.insert("updated", StoreValue::String("08:30".into()));
        assert!(store.contains("updated"));

        assert_eq!(
            store.remove("updated"),
            Some(StoreValue::String("08:30".into()))
        );
        assert!(store.get_all().unwrap().is_empty());
    }
}
