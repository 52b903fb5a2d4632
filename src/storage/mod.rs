//! Persistent storage
//!
//! - Backends: raw string storage (memory with quota, or files on disk)
//! - Key-value store: namespaced JSON values with non-fatal failures
//! - Bounded history: newest-first capped lists under one key

pub mod backend;
pub mod bounded;
pub mod kv;

// Re-export key types
pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use bounded::BoundedHistory;
pub use kv::{KeyValueStore, DEFAULT_PREFIX};

/// Key holding the settings map
pub const SETTINGS_KEY: &str = "settings";

/// Key holding the session archive
pub const SESSIONS_KEY: &str = "sessions";

/// Key holding the batch history
pub const BATCHES_KEY: &str = "batches";
