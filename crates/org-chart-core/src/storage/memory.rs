// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory key-value store with an optional byte quota.
//!
//! Serves as the ephemeral backend when persistent storage is unavailable and
//! as the storage double in tests (failure injection, call counting).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::port::{KeyValueStore, StorageError};

/// Shared in-memory implementation of [`KeyValueStore`].
///
/// Clones share state, so a test can hand one clone to a gateway and inspect
/// the other.
///
/// # Example
///
/// ```
/// use org_chart_core::storage::{KeyValueStore, MemoryStore};
///
/// let store = MemoryStore::with_quota(8);
/// assert!(store.set("k", "1234").is_ok());
/// assert!(store.set("other", "1234").unwrap_err().is_quota_exceeded());
/// ```
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    data: HashMap<String, String>,
    quota: Option<usize>,
    get_count: usize,
    set_count: usize,
    fail_on_get: bool,
    fail_on_set: bool,
}

impl MemoryStoreInner {
    fn used_bytes_without(&self, key: &str) -> usize {
        self.data
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl MemoryStore {
    /// Create an empty, unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store holding at most `bytes` (keys plus values).
    pub fn with_quota(bytes: usize) -> Self {
        let store = Self::default();
        store.set_quota(Some(bytes));
        store
    }

    /// Create a store pre-populated with the given key-value pairs.
    pub fn with_data(data: HashMap<String, String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                data,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Change the byte quota (`None` = unbounded).
    pub fn set_quota(&self, bytes: Option<usize>) {
        self.lock().quota = bytes;
    }

    /// Bytes currently used by keys plus values.
    pub fn used_bytes(&self) -> usize {
        self.lock().used_bytes_without("")
    }

    /// Configure reads to fail.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.lock().fail_on_get = fail;
    }

    /// Configure writes and removals to fail.
    pub fn set_fail_on_set(&self, fail: bool) {
        self.lock().fail_on_set = fail;
    }

    /// Number of `get` calls attempted.
    pub fn get_count(&self) -> usize {
        self.lock().get_count
    }

    /// Number of `set` calls attempted, including failed ones.
    pub fn set_count(&self) -> usize {
        self.lock().set_count
    }

    /// Raw value of a slot, bypassing counters and failure injection.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.lock().data.get(key).cloned()
    }

    /// Whether a slot exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut inner = self.lock();
        inner.get_count += 1;
        if inner.fail_on_get {
            return Err(StorageError::Other("simulated read failure".into()));
        }
        Ok(inner.data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        inner.set_count += 1;
        if inner.fail_on_set {
            return Err(StorageError::Other("simulated write failure".into()));
        }
        if let Some(quota) = inner.quota {
            if inner.used_bytes_without(key) + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded { key: key.to_owned() });
            }
        }
        inner.data.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.fail_on_set {
            return Err(StorageError::Other("simulated write failure".into()));
        }
        inner.data.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let inner = self.lock();
        if inner.fail_on_get {
            return Err(StorageError::Other("simulated read failure".into()));
        }
        let mut keys: Vec<String> = inner.data.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
