// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Storage port for raw string slots (the browser-style local storage contract).

use thiserror::Error;

use crate::model::Violation;

/// Persistent string key-value store.
///
/// Implementations report a full store as [`StorageError::QuotaExceeded`] so
/// the gateway can evict and retry.
pub trait KeyValueStore {
    /// Read a slot. Returns `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Write a slot, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Delete a slot. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// Every key currently present.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }
}

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The write does not fit in the available storage.
    #[error("storage quota exceeded while writing {key}")]
    QuotaExceeded {
        /// Key being written.
        key: String,
    },
    /// A table presented for saving breaks its invariants.
    #[error("invalid hierarchy table ({} violations)", .0.len())]
    Validation(Vec<Violation>),
    /// A persisted payload is present but unusable.
    #[error("corrupted payload: {0}")]
    Corrupted(String),
    /// The key cannot be mapped onto the backing store.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

impl StorageError {
    /// Whether this error means the store is full.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}
