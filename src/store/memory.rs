// In-process counter store
// Counters live in a mutex-guarded map; the add happens while the lock is held

use std::collections::HashMap;
use std::sync::Mutex;

use super::{CounterRecord, CounterStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<CounterRecord>, StoreError> {
        let counters = self.counters.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(counters.get(key).copied().map(CounterRecord::with_count))
    }

    fn atomic_add(&self, key: &str, delta: u64) -> Result<CounterRecord, StoreError> {
        let mut counters = self.counters.lock().map_err(|_| StoreError::Poisoned)?;
        let slot = counters.entry(key.to_string()).or_insert(0);
        *slot = slot
            .checked_add(delta)
            .ok_or_else(|| StoreError::Overflow(key.to_string()))?;
        Ok(CounterRecord::with_count(*slot))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_read_absent_key() {
        let store = MemoryStore::new();
        assert_eq!(store.read("visitor-count").unwrap(), None);
    }

    #[test]
    fn test_add_creates_record() {
        let store = MemoryStore::new();
        assert_eq!(
            store.atomic_add("visitor-count", 1).unwrap(),
            CounterRecord::with_count(1)
        );
        assert_eq!(
            store.read("visitor-count").unwrap(),
            Some(CounterRecord::with_count(1))
        );
        // Other keys stay untouched
        assert_eq!(store.read("other").unwrap(), None);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let store = MemoryStore::new();
        store.atomic_add("visitor-count", u64::MAX).unwrap();
        assert!(matches!(
            store.atomic_add("visitor-count", 1),
            Err(StoreError::Overflow(_))
        ));
        assert_eq!(
            store.read("visitor-count").unwrap(),
            Some(CounterRecord::with_count(u64::MAX))
        );
    }

    #[test]
    fn test_concurrent_adds_do_not_lose_updates() {
        let store = Arc::new(MemoryStore::new());
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..100 {
                        store.atomic_add("visitor-count", 1).unwrap();
                    }
                });
            }
        });
        assert_eq!(
            store.read("visitor-count").unwrap(),
            Some(CounterRecord::with_count(800))
        );
    }
}
