//! Counter store module
//!
//! Defines the collaborator interface the dispatcher talks to and the
//! backends shipped with the service. All atomicity lives behind
//! `CounterStore::atomic_add`; callers never read, add and write back.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::{StoreBackend, StoreConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// A single counter as seen by the store.
///
/// `count` is optional so that a store answering "record exists but carries
/// no count" can be represented and rejected by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub count: Option<u64>,
}

impl CounterRecord {
    pub const fn with_count(count: u64) -> Self {
        Self { count: Some(count) }
    }
}

/// Errors raised by store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store data is corrupt: {0}")]
    Corrupt(String),
    #[error("failed to encode store data: {0}")]
    Encode(String),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("counter '{0}' would overflow")]
    Overflow(String),
}

/// Key-value store holding counter records.
pub trait CounterStore: Send + Sync {
    /// Fetch a record without creating it.
    fn read(&self, key: &str) -> Result<Option<CounterRecord>, StoreError>;

    /// Add `delta` to the record, creating it at zero first if absent, and
    /// return the post-update record. Concurrent calls must not lose updates.
    fn atomic_add(&self, key: &str, delta: u64) -> Result<CounterRecord, StoreError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Shared handle to a store backend
pub type SharedStore = Arc<dyn CounterStore>;

/// Open the backend selected in configuration
pub fn open(config: &StoreConfig) -> Result<SharedStore, StoreError> {
    let store: SharedStore = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(FileStore::open(&config.path)?),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory_backend() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            path: "unused.toml".to_string(),
            key: "visitor-count".to_string(),
        };
        let store = open(&config).unwrap();
        assert_eq!(store.name(), "memory");
        assert_eq!(store.read("visitor-count").unwrap(), None);
    }

    #[test]
    fn test_open_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.toml");
        let config = StoreConfig {
            backend: StoreBackend::File,
            path: path.to_string_lossy().into_owned(),
            key: "visitor-count".to_string(),
        };
        let store = open(&config).unwrap();
        assert_eq!(store.name(), "file");
        assert_eq!(
            store.atomic_add("visitor-count", 1).unwrap(),
            CounterRecord::with_count(1)
        );
    }
}
