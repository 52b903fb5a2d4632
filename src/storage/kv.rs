//! Namespaced key-value store
//!
//! Values are stored as JSON under `<prefix><key>`. Every failure is
//! non-fatal: `save` reports `false`, `load` reports `None`, and the
//! cause is logged so the application keeps working without persistence.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::errors::Result;
use crate::storage::backend::{MemoryBackend, StorageBackend};

/// Default key namespace
pub const DEFAULT_PREFIX: &str = "expression_analyser_";

/// JSON key-value store over a [`StorageBackend`]
#[derive(Clone)]
pub struct KeyValueStore {
    backend: Arc<dyn StorageBackend>,
    prefix: String,
}

impl KeyValueStore {
    /// Create a store with the default prefix
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_prefix(backend, DEFAULT_PREFIX)
    }

    /// Create a store with a custom prefix
    pub fn with_prefix(backend: Arc<dyn StorageBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    /// Unbounded in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Key namespace
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Serialize and store `value`; returns `false` on any failure
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                error!("Storage save failed for {}: {}", key, e);
                return false;
            }
        };

        match self.backend.set(&self.full_key(key), json) {
            Ok(()) => {
                debug!("Saved {}", key);
                true
            }
            Err(e) => {
                error!("Storage save failed for {}: {}", key, e);
                false
            }
        }
    }

    /// Load and deserialize `key`; missing or malformed values are `None`
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_load(key) {
            Ok(value) => value,
            Err(e) => {
                error!("Storage load failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Like [`load`](Self::load) but surfaces backend read errors
    ///
    /// A missing key and a malformed value are both `Ok(None)`.
    pub fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.backend.get(&self.full_key(key))? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Discarding malformed value for {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Delete `key`
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(&self.full_key(key)) {
            warn!("Storage remove failed for {}: {}", key, e);
        }
    }

    /// Delete every key in this store's namespace
    pub fn clear(&self) {
        for key in self.namespaced_keys() {
            if let Err(e) = self.backend.remove(&key) {
                warn!("Storage clear failed for {}: {}", key, e);
            }
        }
    }

    /// Total length of stored values in this namespace
    pub fn size_bytes(&self) -> usize {
        self.namespaced_keys()
            .iter()
            .filter_map(|key| self.backend.get(key).ok().flatten())
            .map(|value| value.len())
            .sum()
    }

    fn namespaced_keys(&self) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.prefix))
                .collect(),
            Err(e) => {
                warn!("Storage key listing failed: {}", e);
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("prefix", &self.prefix)
            .finish()
    }
}
