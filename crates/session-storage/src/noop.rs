//! Storage backend for contexts without durable storage.

use crate::{KeyValueStore, StorageResult};

/// Reads are always empty and writes are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStorage;

impl KeyValueStore for NoopStorage {
    fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Ok(())
    }

    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Ok(None)
    }

    fn delete(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }
}
