//! Bounded newest-first history persisted under a single key
//!
//! Backs both the session archive (cap 50) and the batch history (cap 20).
//! `push_front` is a plain read-modify-write against the store; two
//! writers appending at once can lose an update. A backend read error
//! aborts the write so the stored list is never replaced blindly.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::error;

use crate::errors::Result;
use crate::storage::kv::KeyValueStore;

/// Newest-first list of `T` capped at `capacity` entries
#[derive(Debug)]
pub struct BoundedHistory<T> {
    store: Arc<KeyValueStore>,
    key: String,
    capacity: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for BoundedHistory<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            capacity: self.capacity,
            _marker: PhantomData,
        }
    }
}

impl<T> BoundedHistory<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<KeyValueStore>, key: impl Into<String>, capacity: usize) -> Self {
        Self {
            store,
            key: key.into(),
            capacity,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All entries, newest first; a missing or corrupt value is empty
    pub fn load(&self) -> Vec<T> {
        self.store.load(&self.key).unwrap_or_default()
    }

    /// Entries for a read-modify-write; backend errors are surfaced
    pub fn try_load(&self) -> Result<Vec<T>> {
        Ok(self.store.try_load(&self.key)?.unwrap_or_default())
    }

    /// Insert at the front, evict past capacity and write back
    ///
    /// Returns `false` without writing when the current list can't be read.
    pub fn push_front(&self, entry: T) -> bool {
        let mut entries = match self.try_load() {
            Ok(entries) => entries,
            Err(e) => {
                error!("Not updating {}: {}", self.key, e);
                return false;
            }
        };
        entries.insert(0, entry);
        entries.truncate(self.capacity);
        self.store.save(&self.key, &entries)
    }

    /// Replace the stored list
    pub fn replace(&self, mut entries: Vec<T>) -> bool {
        entries.truncate(self.capacity);
        self.store.save(&self.key, &entries)
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the stored list
    pub fn clear(&self) {
        self.store.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::errors::AnalyserError;
    use crate::storage::{MemoryBackend, StorageBackend};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn history(capacity: usize) -> BoundedHistory<u32> {
        BoundedHistory::new(Arc::new(KeyValueStore::in_memory()), "items", capacity)
    }

    /// Memory backend whose reads can be switched to fail
    #[derive(Default)]
    struct UnreadableBackend {
        inner: MemoryBackend,
        fail_reads: AtomicBool,
    }

    impl StorageBackend for UnreadableBackend {
        fn get(&self, key: &str) -> Result<Option<String>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(AnalyserError::StorageError("permission denied".to_string()));
            }
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: String) -> Result<()> {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }

        fn keys(&self) -> Result<Vec<String>> {
            self.inner.keys()
        }
    }

    #[test]
    fn test_read_error_keeps_stored_list() {
        let backend = Arc::new(UnreadableBackend::default());
        let store = Arc::new(KeyValueStore::new(backend.clone()));
        let h: BoundedHistory<u32> = BoundedHistory::new(store, "items", 5);
        h.push_front(1);
        h.push_front(2);

        backend.fail_reads.store(true, Ordering::SeqCst);
        assert!(!h.push_front(3));
        assert!(h.try_load().is_err());

        backend.fail_reads.store(false, Ordering::SeqCst);
        assert_eq!(h.load(), vec![2, 1]);
    }

    #[test]
    fn test_malformed_list_starts_over() {
        let store = Arc::new(KeyValueStore::in_memory());
        store.save("items", &"not a list");
        let h: BoundedHistory<u32> = BoundedHistory::new(store, "items", 5);

        assert_eq!(h.try_load().unwrap(), Vec::<u32>::new());
        assert!(h.push_front(9));
        assert_eq!(h.load(), vec![9]);
    }

    #[test]
    fn test_newest_first() {
        let h = history(5);
        h.push_front(1);
        h.push_front(2);
        assert_eq!(h.load(), vec![2, 1]);
    }

    #[test]
    fn test_evicts_oldest() {
        let h = history(3);
        for i in 0..5 {
            assert!(h.push_front(i));
        }
        assert_eq!(h.load(), vec![4, 3, 2]);
    }

    #[test]
    fn test_clear() {
        let h = history(3);
        h.push_front(7);
        h.clear();
        assert!(h.is_empty());
    }
}
