//! In-memory key-value store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{KeyValueStore, StorageError, StorageResult};

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, String>,
    fail_writes: bool,
    write_count: usize,
}

/// Process-local store backed by a shared map.
///
/// Clones share state, so tests can inspect what a store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `set` calls fail (simulates a full or revoked store).
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_writes = fail;
        }
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.inner.lock().map(|i| i.write_count).unwrap_or(0)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner
            .lock()
            .map(|i| i.entries.contains_key(key))
            .unwrap_or(false)
    }

    /// Write directly, bypassing failure injection and the write counter.
    pub fn seed(&self, key: &str, value: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.insert(key.to_string(), value.to_string());
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let inner = self.inner.lock()?;
        Ok(inner.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut inner = self.inner.lock()?;
        if inner.fail_writes {
            return Err(StorageError::Unavailable(format!(
                "write to {} rejected",
                key
            )));
        }
        inner.entries.insert(key.to_string(), value.to_string());
        inner.write_count += 1;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let mut inner = self.inner.lock()?;
        Ok(inner.entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_fail_writes() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.set("k", "v"),
            Err(StorageError::Unavailable(_))
        ));
        assert_eq!(store.write_count(), 0);

        store.set_fail_writes(false);
        store.set("k", "v").unwrap();
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let handle = store.clone();
        store.set("k", "v").unwrap();
        assert!(handle.contains_key("k"));
    }
}
