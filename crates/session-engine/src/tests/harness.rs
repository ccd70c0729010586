//! Test harness for session engine tests.
//!
//! Provides:
//! - ScriptedTransport: per-path reply queues with call counters and a gate
//! - CountingStorage: in-memory storage that counts writes per key
//! - TestHarness: an engine wired to the above, a MemoryNavigator and a ManualClock

use crate::{
    AuthTransport, EngineOptions, ManualClock, MemoryNavigator, SessionEngine, TransportError,
    TOKEN_PATH, USER_INFO_PATH,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use session_storage::{KeyValueStore, MemoryStorage, SessionStore, StorageError, StorageResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub const ISSUER: &str = "https://issuer.example";
pub const APP_URL: &str = "https://app.example/callback";
/// Time the manual clock starts at.
pub const START_MILLIS: i64 = 1_000;

/// What the scripted transport answers with.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16),
    /// Connection failure.
    Unreachable,
}

impl Reply {
    /// A `/token` body whose claims span `lifetime_secs`.
    pub fn token(token: &str, lifetime_secs: i64) -> Self {
        Reply::Json(json!({
            "token": token,
            "claims": {"iat": 1_000, "exp": 1_000 + lifetime_secs, "sub": "u1"},
        }))
    }

    pub fn user(sub: &str) -> Self {
        Reply::Json(json!({"sub": sub, "name": "A"}))
    }

    fn into_result(self) -> Result<Value, TransportError> {
        match self {
            Reply::Json(value) => Ok(value),
            Reply::Status(status) => Err(TransportError::Status {
                status,
                message: "Error fetching JSON".to_string(),
            }),
            Reply::Unreachable => Err(TransportError::Request {
                message: "connection refused".to_string(),
                transient: true,
            }),
        }
    }
}

/// Transport that answers from per-path scripts.
///
/// Queued replies are used first, then the path's default. Paths with
/// neither answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    defaults: Mutex<HashMap<String, Reply>>,
    calls: Mutex<HashMap<String, usize>>,
    session_tokens: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call to `path` with `reply`.
    pub fn set_default(&self, path: &str, reply: Reply) {
        self.defaults.lock().insert(path.to_string(), reply);
    }

    /// Answer the next call to `path` with `reply`.
    pub fn queue(&self, path: &str, reply: Reply) {
        self.queued
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().get(path).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Session tokens presented, oldest first.
    pub fn session_tokens(&self) -> Vec<String> {
        self.session_tokens.lock().clone()
    }

    /// Hold every reply until `release` is called.
    pub fn hold(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    fn next_reply(&self, path: &str) -> Reply {
        if let Some(reply) = self.queued.lock().get_mut(path).and_then(VecDeque::pop_front) {
            return reply;
        }
        self.defaults
            .lock()
            .get(path)
            .cloned()
            .unwrap_or(Reply::Status(404))
    }
}

#[async_trait]
impl AuthTransport for ScriptedTransport {
    async fn get_json(&self, path: &str, session_token: &str) -> Result<Value, TransportError> {
        *self.calls.lock().entry(path.to_string()).or_default() += 1;
        self.session_tokens.lock().push(session_token.to_string());

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        self.next_reply(path).into_result()
    }
}

/// Memory storage that counts writes and can be told to fail them.
#[derive(Debug, Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    writes: Mutex<HashMap<String, usize>>,
    fail_writes: AtomicBool,
}

impl CountingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self, key: &str) -> usize {
        self.writes.lock().get(key).copied().unwrap_or(0)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.get(key).ok().flatten()
    }
}

impl KeyValueStore for CountingStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                entries: Vec::new(),
                size_bytes: 0,
            });
        }
        *self.writes.lock().entry(key.to_string()).or_default() += 1;
        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(key)
    }
}

/// An engine wired to scripted collaborators.
pub struct TestHarness {
    pub engine: SessionEngine,
    pub transport: Arc<ScriptedTransport>,
    pub navigator: Arc<MemoryNavigator>,
    pub storage: Arc<CountingStorage>,
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    /// Fresh storage, landing on `url`.
    pub fn new(url: &str) -> Self {
        Self::build(
            url,
            Arc::new(CountingStorage::new()),
            Arc::new(ScriptedTransport::new()),
        )
    }

    /// Landing on `url` with the identity endpoints answering for `sub`
    /// and tokens living `lifetime_secs`.
    pub fn with_issuer(url: &str, sub: &str, lifetime_secs: i64) -> Self {
        let harness = Self::new(url);
        harness.transport.set_default(USER_INFO_PATH, Reply::user(sub));
        harness
            .transport
            .set_default(TOKEN_PATH, Reply::token("jwt1", lifetime_secs));
        harness
    }

    pub fn build(url: &str, storage: Arc<CountingStorage>, transport: Arc<ScriptedTransport>) -> Self {
        let navigator = Arc::new(MemoryNavigator::new(url));
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let engine = SessionEngine::with_clock(
            EngineOptions::new(ISSUER),
            SessionStore::new(storage.clone()),
            transport.clone(),
            navigator.clone(),
            clock.clone(),
        );

        Self {
            engine,
            transport,
            navigator,
            storage,
            clock,
        }
    }

    /// A new engine on the same storage and issuer, as after a page load.
    pub fn reload(&self, url: &str) -> Self {
        Self::build(url, self.storage.clone(), self.transport.clone())
    }

    pub fn store(&self) -> SessionStore {
        SessionStore::new(self.storage.clone())
    }
}

/// Let spawned tasks run. Under paused time this also lets timers fire.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
