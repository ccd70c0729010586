//! In-memory storage backend with optional quota.

use crate::{KeyValueStore, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Bytes used by a string under UTF-16 accounting.
fn utf16_bytes(s: &str) -> usize {
    s.encode_utf16().count() * 2
}

/// In-memory key-value store.
///
/// With a quota, every entry costs two bytes per UTF-16 code unit of its key
/// and value, the way browser storage accounts for it.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes beyond `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            data: Mutex::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Total bytes currently used.
    pub fn size_bytes(&self) -> usize {
        Self::used(&self.data.lock())
    }

    fn used(data: &BTreeMap<String, String>) -> usize {
        data.iter()
            .map(|(k, v)| utf16_bytes(k) + utf16_bytes(v))
            .sum()
    }
}

impl KeyValueStore for MemoryStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.lock();

        if let Some(quota) = self.quota_bytes {
            let current = Self::used(&data);
            let replaced = data
                .get(key)
                .map(|old| utf16_bytes(key) + utf16_bytes(old))
                .unwrap_or(0);
            let next = current - replaced + utf16_bytes(key) + utf16_bytes(value);
            if next > quota {
                let entries = data
                    .iter()
                    .map(|(k, v)| format!("{}:{}", k, v.encode_utf16().count()))
                    .collect();
                tracing::warn!(key, size_bytes = current, quota, "Storage quota exceeded");
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    entries,
                    size_bytes: current,
                });
            }
        }

        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.data.lock().keys().cloned().collect())
    }
}
