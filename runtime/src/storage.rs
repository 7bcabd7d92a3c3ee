//! Key-value persistence for state slices that outlive the process.
//!
//! [`KeyValueStorage`] is the pluggable backend boundary: implementations
//! store raw JSON strings under string keys. [`StorageExt`] layers typed
//! serde access on top of any backend, and [`Cached`] wraps one value with
//! write-debouncing so high-frequency updates (scroll positions, draft
//! text) do not hammer the backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::task::AbortHandle;
use tracing::warn;

/// Errors from the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A value could not be serialized or deserialized.
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    /// The backend itself failed.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// A string-keyed persistence backend.
///
/// Implementations must be safe to call from any task. The engine only
/// stores JSON strings; typed access lives in [`StorageExt`].
pub trait KeyValueStorage: Send + Sync {
    /// Persist `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// [`StorageError::Backend`] when the backend cannot persist.
    fn save_raw(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Load the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// [`StorageError::Backend`] when the backend cannot read.
    fn load_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove the value stored under `key`; missing keys are not an error.
    ///
    /// # Errors
    ///
    /// [`StorageError::Backend`] when the backend cannot delete.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed serde access over any [`KeyValueStorage`].
pub trait StorageExt: KeyValueStorage {
    /// Serialize `value` to JSON and persist it under `key`.
    ///
    /// # Errors
    ///
    /// Serialization or backend failure.
    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.save_raw(key, raw)
    }

    /// Load and deserialize the value under `key`, if any.
    ///
    /// # Errors
    ///
    /// Deserialization or backend failure.
    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.load_raw(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

impl<K: KeyValueStorage + ?Sized> StorageExt for K {}

/// In-process backend for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// An empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn save_raw(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries().insert(key.to_owned(), value);
        Ok(())
    }

    fn load_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// One persisted value with debounced writes.
///
/// `set` updates the in-memory value immediately and schedules a flush
/// after the debounce window; rapid successive sets collapse into a single
/// write of the newest value. [`Cached::flush`] forces the write through
/// now. Dropping the handle abandons a still-pending flush, so call
/// `flush` before teardown when the last write matters.
pub struct Cached<T> {
    key: String,
    value: T,
    storage: Arc<dyn KeyValueStorage>,
    debounce: Duration,
    pending: Option<AbortHandle>,
}

impl<T> Cached<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    /// Load the value under `key`, falling back to `fallback` when the key
    /// is missing or unreadable. A corrupt or unavailable entry logs a
    /// warning rather than failing startup.
    pub fn load_or(
        storage: Arc<dyn KeyValueStorage>,
        key: impl Into<String>,
        debounce: Duration,
        fallback: T,
    ) -> Self {
        let key = key.into();
        let value = match storage.load::<T>(&key) {
            Ok(Some(value)) => value,
            Ok(None) => fallback,
            Err(error) => {
                warn!(key = %key, %error, "Discarding unreadable cached value");
                fallback
            },
        };
        Self {
            key,
            value,
            storage,
            debounce,
            pending: None,
        }
    }

    /// The current in-memory value.
    pub const fn get(&self) -> &T {
        &self.value
    }

    /// Replace the value and schedule a debounced flush.
    ///
    /// Must be called from within a tokio runtime.
    pub fn set(&mut self, value: T) {
        self.value = value;
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        let raw = match serde_json::to_string(&self.value) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(key = %self.key, %error, "Cached value is not serializable, skipping flush");
                return;
            },
        };
        let storage = Arc::clone(&self.storage);
        let key = self.key.clone();
        let debounce = self.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Err(error) = storage.save_raw(&key, raw) {
                warn!(key = %key, %error, "Debounced flush failed");
            }
        });
        self.pending = Some(handle.abort_handle());
    }

    /// Write the current value through immediately, cancelling any pending
    /// debounced flush.
    ///
    /// # Errors
    ///
    /// Serialization or backend failure.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.storage.save(&self.key, &self.value)
    }
}

impl<T> Drop for Cached<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
