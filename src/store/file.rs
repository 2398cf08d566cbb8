// File-backed counter store
// Persists all counters to a single TOML document

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{CounterRecord, CounterStore, StoreError};
use crate::logger;

/// On-disk layout
///
/// ```toml
/// [counters]
/// visitor-count = 42
/// ```
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
struct CounterFile {
    #[serde(default)]
    counters: BTreeMap<String, u64>,
}

/// Counter store persisted to a TOML file.
///
/// Every operation holds `guard` for its whole load/modify/store cycle, and
/// writes go through a temp file plus rename so readers never see a partial
/// document. Atomicity holds within one process only.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    /// Open a store at `path`, creating parent directories as needed.
    /// The file itself is created lazily on the first add.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            path,
            guard: Mutex::new(()),
        };

        // Fail fast on a corrupt file instead of on the first request
        let existing = store.load()?;
        logger::write_info(&format!(
            "[Store] Opened {} ({} counters)",
            store.path().display(),
            existing.counters.len()
        ));
        Ok(store)
    }

    #[allow(clippy::missing_const_for_fn)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<CounterFile, StoreError> {
        if !self.path.exists() {
            return Ok(CounterFile::default());
        }
        let content = fs::read_to_string(&self.path)?;
        toml::from_str(&content)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, file: &CounterFile) -> Result<(), StoreError> {
        let content =
            toml::to_string_pretty(file).map_err(|e| StoreError::Encode(e.to_string()))?;
        let tmp_path = self.path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl CounterStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<CounterRecord>, StoreError> {
        let _guard = self.guard.lock().map_err(|_| StoreError::Poisoned)?;
        let file = self.load()?;
        Ok(file.counters.get(key).copied().map(CounterRecord::with_count))
    }

    fn atomic_add(&self, key: &str, delta: u64) -> Result<CounterRecord, StoreError> {
        let _guard = self.guard.lock().map_err(|_| StoreError::Poisoned)?;
        let mut file = self.load()?;
        let current = file.counters.get(key).copied().unwrap_or(0);
        let updated = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::Overflow(key.to_string()))?;
        file.counters.insert(key.to_string(), updated);
        self.save(&file)?;
        Ok(CounterRecord::with_count(updated))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_missing_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("counts.toml")).unwrap();
        assert_eq!(store.read("visitor-count").unwrap(), None);
        // Reads never create the file
        assert!(!store.path().exists());
    }

    #[test]
    fn test_add_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("counts.toml");

        {
            let store = FileStore::open(&path).unwrap();
            store.atomic_add("visitor-count", 1).unwrap();
            store.atomic_add("visitor-count", 1).unwrap();
            store.atomic_add("downloads", 5).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(
            store.read("visitor-count").unwrap(),
            Some(CounterRecord::with_count(2))
        );
        assert_eq!(
            store.read("downloads").unwrap(),
            Some(CounterRecord::with_count(5))
        );
    }

    #[test]
    fn test_corrupt_file_rejected_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.toml");
        fs::write(&path, "counters = \"not a table\"").unwrap();
        assert!(matches!(FileStore::open(&path), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.toml");
        let store = FileStore::open(&path).unwrap();
        store.atomic_add("visitor-count", 3).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: CounterFile = toml::from_str(&content).unwrap();
        assert_eq!(parsed.counters.get("visitor-count"), Some(&3));
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_concurrent_adds_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path().join("counts.toml")).unwrap());
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..10 {
                        store.atomic_add("visitor-count", 1).unwrap();
                    }
                });
            }
        });
        assert_eq!(
            store.read("visitor-count").unwrap(),
            Some(CounterRecord::with_count(40))
        );
    }
}
