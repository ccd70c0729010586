//! Access-token cache types and the versioned cache slot.

use crate::TransportError;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Refresh this long before `valid_until`.
pub const REFRESH_LEAD_MS: i64 = 10_000;

/// Never schedule a refresh sooner than this.
pub const MIN_REFRESH_DELAY_MS: i64 = 10_000;

/// Body of the issuer's `/token` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenInfo {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub claims: Option<Value>,
}

impl AccessTokenInfo {
    /// Deserialize the claims into a caller-defined type.
    pub fn claims_as<T: DeserializeOwned>(&self) -> serde_json::Result<Option<T>> {
        self.claims
            .clone()
            .map(serde_json::from_value)
            .transpose()
    }

    fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    fn numeric_claim(&self, name: &str) -> Option<f64> {
        self.claims.as_ref()?.get(name)?.as_f64()
    }
}

/// One resolved fetch of the access token.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessTokenCacheEntry {
    pub value: AccessTokenInfo,
    /// Epoch millis. `None` when claims lack numeric `iat`/`exp`, or on error.
    pub valid_until: Option<i64>,
    /// The issuer rejected the session token.
    pub is_error: bool,
}

impl AccessTokenCacheEntry {
    /// Build an entry from a successful response fetched at `fetched_at`.
    ///
    /// The lifetime is the token's own `exp - iat` added to the local fetch
    /// time, so client/issuer clock skew does not matter. Out-of-range
    /// lifetimes saturate.
    pub fn from_response(value: AccessTokenInfo, fetched_at: i64) -> Self {
        let valid_until = if value.has_token() {
            match (value.numeric_claim("iat"), value.numeric_claim("exp")) {
                (Some(iat), Some(exp)) => {
                    Some(fetched_at.saturating_add((1000.0 * (exp - iat)) as i64))
                }
                _ => None,
            }
        } else {
            None
        };

        Self {
            value,
            valid_until,
            is_error: false,
        }
    }

    /// Classify a `/token` response.
    ///
    /// A 403 becomes an error entry; other transport failures stay errors.
    pub fn from_transport(
        response: Result<Value, TransportError>,
        fetched_at: i64,
    ) -> Result<Self, TransportError> {
        match response {
            Ok(body) => {
                let value: AccessTokenInfo = serde_json::from_value(body)
                    .map_err(|e| TransportError::Decode(e.to_string()))?;
                Ok(Self::from_response(value, fetched_at))
            }
            Err(e) if e.is_session_invalid() => Ok(Self::rejected()),
            Err(e) => Err(e),
        }
    }

    /// Entry recorded when the issuer answers 403.
    pub fn rejected() -> Self {
        Self {
            value: AccessTokenInfo::default(),
            valid_until: None,
            is_error: true,
        }
    }

    pub fn is_valid_at(&self, now: i64) -> bool {
        self.valid_until.is_some_and(|valid_until| valid_until > now)
    }
}

/// Delay before the next background refresh, in millis.
pub fn refresh_delay(valid_until: i64, now: i64) -> i64 {
    valid_until
        .saturating_sub(REFRESH_LEAD_MS)
        .saturating_sub(now)
        .max(MIN_REFRESH_DELAY_MS)
}

pub(crate) type FetchResult = Result<AccessTokenCacheEntry, TransportError>;
pub(crate) type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Single-slot cache holding the latest access-token fetch.
///
/// Every install gets a fresh generation. Invalidation compares generations
/// so a slow caller never clears a fetch a faster caller started.
#[derive(Default)]
pub(crate) struct AccessTokenSlot {
    slot: Mutex<Option<(u64, SharedFetch)>>,
    next_generation: Mutex<u64>,
}

impl AccessTokenSlot {
    /// The live fetch, or a new one from `start` when the slot is empty.
    /// The bool is true when this call installed the fetch.
    pub(crate) fn get_or_install(
        &self,
        start: impl FnOnce() -> BoxFuture<'static, FetchResult>,
    ) -> (u64, SharedFetch, bool) {
        let mut slot = self.slot.lock();
        if let Some((generation, fetch)) = slot.as_ref() {
            return (*generation, fetch.clone(), false);
        }
        let (generation, fetch) = self.next(start());
        *slot = Some((generation, fetch.clone()));
        (generation, fetch, true)
    }

    /// Replace whatever is cached with a new fetch.
    pub(crate) fn install(&self, fetch: BoxFuture<'static, FetchResult>) -> (u64, SharedFetch) {
        let (generation, fetch) = self.next(fetch);
        *self.slot.lock() = Some((generation, fetch.clone()));
        (generation, fetch)
    }

    pub(crate) fn current(&self) -> Option<(u64, SharedFetch)> {
        self.slot.lock().clone()
    }

    /// Clear the slot only if it still holds `generation`.
    pub(crate) fn clear_if(&self, generation: u64) -> bool {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some((current, _)) if *current == generation => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn clear(&self) {
        *self.slot.lock() = None;
    }

    /// The completed entry, without waiting.
    pub(crate) fn peek(&self) -> Option<AccessTokenCacheEntry> {
        let (_, fetch) = self.current()?;
        fetch.peek().and_then(|result| result.as_ref().ok()).cloned()
    }

    fn next(&self, fetch: BoxFuture<'static, FetchResult>) -> (u64, SharedFetch) {
        let mut next_generation = self.next_generation.lock();
        *next_generation += 1;
        (*next_generation, fetch.shared())
    }
}
