//! Cache store abstraction and an in-memory implementation

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::value::CacheValue;

/// Errors raised by cache store backends
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing the backing storage failed
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The entry could not be serialized
    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A lock guarding the store was poisoned
    #[error("Cache lock poisoned")]
    Poisoned,
}

/// An entry as held by a cache store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// The stored value
    pub data: CacheValue,
    /// Invalidation tags the entry was stored with
    pub tags: BTreeSet<String>,
    /// When the entry was written
    pub cached_at: DateTime<Utc>,
}

/// Key/value storage for cached API payloads
///
/// Implementations are shared between client instances and must be safe for
/// concurrent use. Writes to the same key race; the last write wins.
pub trait CacheStore: Send + Sync {
    /// Reads the entry stored under `key`, if any
    fn get(&self, key: &str) -> Option<StoredEntry>;

    /// Stores `value` under `key` together with its invalidation tags
    fn set(&self, key: &str, value: &CacheValue, tags: &BTreeSet<String>) -> Result<(), CacheError>;
}

/// Process-local cache store backed by a `HashMap`
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Option<StoredEntry> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &CacheValue, tags: &BTreeSet<String>) -> Result<(), CacheError> {
        let entry = StoredEntry {
            data: value.clone(),
            tags: tags.clone(),
            cached_at: Utc::now(),
        };
        self.entries
            .write()
            .map_err(|_| CacheError::Poisoned)?
            .insert(key.to_string(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiResponse;
    use serde_json::json;

    fn value(n: i32) -> CacheValue {
        CacheValue::new(ApiResponse::new(json!({"n": n})).unwrap(), None, ["numbers"])
    }

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let store = MemoryCacheStore::new();
        assert!(store.get("missing").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_then_get_returns_value_and_tags() {
        let store = MemoryCacheStore::new();
        let value = value(1);

        store.set("key", &value, value.tags()).expect("Set should succeed");

        let entry = store.get("key").expect("Entry should exist");
        assert_eq!(entry.data, value);
        assert!(entry.tags.contains("numbers"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_overwrites_existing_entry() {
        let store = MemoryCacheStore::new();
        store.set("key", &value(1), &BTreeSet::new()).unwrap();
        store.set("key", &value(2), &BTreeSet::new()).unwrap();

        let entry = store.get("key").unwrap();
        assert_eq!(entry.data.data().get("n"), Some(&json!(2)));
        assert_eq!(store.len(), 1);
    }
}
