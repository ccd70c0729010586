//! Typed access to the session engine's persisted keys.

use crate::{KeyValueStore, StorageError, StorageKeys, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Value written under `RETRY_LOGIN` while a silent re-login is pending.
const RETRY_MARKER: u8 = 1;

/// JSON-encoding facade over a [`KeyValueStore`].
///
/// A stored value that fails to decode reads as absent.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a session store over the given backend
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Underlying backend.
    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    /// Read and decode a JSON value.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.storage.get(key)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Discarding malformed stored value");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Encode and write a JSON value.
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let json = serde_json::to_string(value).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(key, &json)
    }

    /// Remove a key. Absent keys are not an error.
    pub fn unset(&self, key: &str) -> StorageResult<bool> {
        self.storage.delete(key)
    }

    // ==========================================
    // Session token
    // ==========================================

    /// Retrieve the persisted session token
    pub fn session_token(&self) -> StorageResult<Option<String>> {
        Ok(self
            .get_json::<String>(StorageKeys::CSRF_TOKEN)?
            .filter(|token| !token.is_empty()))
    }

    /// Persist the session token, replacing any previous one
    pub fn set_session_token(&self, token: &str) -> StorageResult<()> {
        self.set_json(StorageKeys::CSRF_TOKEN, token)
    }

    /// Forget the session token
    pub fn clear_session_token(&self) -> StorageResult<bool> {
        self.unset(StorageKeys::CSRF_TOKEN)
    }

    // ==========================================
    // Logged-in flag
    // ==========================================

    /// Persisted logged-in flag; absent reads as `false`
    pub fn is_logged_in(&self) -> StorageResult<bool> {
        Ok(self
            .get_json::<bool>(StorageKeys::LOGGED_IN)?
            .unwrap_or(false))
    }

    /// Persist the logged-in flag
    pub fn set_logged_in(&self, logged_in: bool) -> StorageResult<()> {
        self.set_json(StorageKeys::LOGGED_IN, &logged_in)
    }

    /// Remove the logged-in flag
    pub fn clear_logged_in(&self) -> StorageResult<bool> {
        self.unset(StorageKeys::LOGGED_IN)
    }

    // ==========================================
    // User info snapshot
    // ==========================================

    /// Last persisted identity payload. JSON `null` reads as absent.
    pub fn user_info(&self) -> StorageResult<Option<Value>> {
        Ok(self
            .get_json::<Value>(StorageKeys::USER_INFO)?
            .filter(|value| !value.is_null()))
    }

    /// Persist the identity payload
    pub fn set_user_info(&self, user_info: &Value) -> StorageResult<()> {
        self.set_json(StorageKeys::USER_INFO, user_info)
    }

    /// Remove the identity payload
    pub fn clear_user_info(&self) -> StorageResult<bool> {
        self.unset(StorageKeys::USER_INFO)
    }

    // ==========================================
    // Retry-login marker
    // ==========================================

    /// Whether a silent re-login redirect is pending
    pub fn has_retry_marker(&self) -> StorageResult<bool> {
        Ok(self.get_json::<Value>(StorageKeys::RETRY_LOGIN)?.is_some())
    }

    /// Mark a silent re-login redirect as pending
    pub fn set_retry_marker(&self) -> StorageResult<()> {
        self.set_json(StorageKeys::RETRY_LOGIN, &RETRY_MARKER)
    }

    /// Clear the retry marker
    pub fn clear_retry_marker(&self) -> StorageResult<bool> {
        self.unset(StorageKeys::RETRY_LOGIN)
    }

    // ==========================================
    // Bulk operations
    // ==========================================

    /// Clear the logged-in flag and identity payload, and optionally the
    /// session token.
    pub fn reset_identity(&self, reset_session_token: bool) -> StorageResult<()> {
        self.clear_logged_in()?;
        self.clear_user_info()?;
        if reset_session_token {
            self.clear_session_token()?;
        }
        Ok(())
    }

    /// Remove every key owned by the session engine
    pub fn clear_all(&self) -> StorageResult<()> {
        for key in StorageKeys::ALL {
            self.unset(key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use serde_json::json;

    fn store() -> (Arc<MemoryStorage>, SessionStore) {
        let backend = Arc::new(MemoryStorage::new());
        (backend.clone(), SessionStore::new(backend))
    }

    #[test]
    fn test_session_token_roundtrip_is_json_encoded() {
        let (backend, store) = store();
        assert_eq!(store.session_token().unwrap(), None);

        store.set_session_token("abc").unwrap();
        assert_eq!(
            backend.get(StorageKeys::CSRF_TOKEN).unwrap(),
            Some("\"abc\"".to_string())
        );
        assert_eq!(store.session_token().unwrap(), Some("abc".to_string()));
    }

    #[test]
    fn test_malformed_value_reads_as_absent() {
        let (backend, store) = store();
        backend.set(StorageKeys::CSRF_TOKEN, "abc").unwrap();
        backend.set(StorageKeys::LOGGED_IN, "{oops").unwrap();

        assert_eq!(store.session_token().unwrap(), None);
        assert!(!store.is_logged_in().unwrap());
    }

    #[test]
    fn test_logged_in_and_user_info() {
        let (_, store) = store();
        assert!(!store.is_logged_in().unwrap());

        store.set_logged_in(true).unwrap();
        store
            .set_user_info(&json!({"sub": "u1", "name": "A"}))
            .unwrap();

        assert!(store.is_logged_in().unwrap());
        assert_eq!(
            store.user_info().unwrap(),
            Some(json!({"sub": "u1", "name": "A"}))
        );

        store.set_user_info(&Value::Null).unwrap();
        assert_eq!(store.user_info().unwrap(), None);
    }

    #[test]
    fn test_retry_marker_is_literal_one() {
        let (backend, store) = store();
        assert!(!store.has_retry_marker().unwrap());

        store.set_retry_marker().unwrap();
        assert_eq!(
            backend.get(StorageKeys::RETRY_LOGIN).unwrap(),
            Some("1".to_string())
        );
        assert!(store.has_retry_marker().unwrap());

        assert!(store.clear_retry_marker().unwrap());
        assert!(!store.clear_retry_marker().unwrap());
    }

    #[test]
    fn test_reset_identity_keeps_token_unless_asked() {
        let (_, store) = store();
        store.set_session_token("abc").unwrap();
        store.set_logged_in(true).unwrap();
        store.set_user_info(&json!({"sub": "u1"})).unwrap();

        store.reset_identity(false).unwrap();
        assert!(!store.is_logged_in().unwrap());
        assert_eq!(store.user_info().unwrap(), None);
        assert_eq!(store.session_token().unwrap(), Some("abc".to_string()));

        store.reset_identity(true).unwrap();
        assert_eq!(store.session_token().unwrap(), None);
    }

    #[test]
    fn test_clear_all() {
        let (backend, store) = store();
        backend.set("unrelated", "1").unwrap();
        store.set_session_token("abc").unwrap();
        store.set_retry_marker().unwrap();

        store.clear_all().unwrap();
        assert_eq!(backend.keys().unwrap(), vec!["unrelated".to_string()]);
    }

    #[test]
    fn test_storage_keys_unique() {
        let unique: std::collections::HashSet<_> = StorageKeys::ALL.iter().collect();
        assert_eq!(unique.len(), StorageKeys::ALL.len(), "Storage keys must be unique");
    }
}
