//! Session engine: session token, access token, identity and login state.
//!
//! A `SessionEngine` owns everything the host needs to keep one browser-like
//! session alive against the issuer:
//!
//! - the session (CSRF) token, picked up from the current URL and persisted
//! - a single-slot access-token cache shared by concurrent callers
//! - the identity payload, persisted so it survives restarts
//! - the logged-in flag, re-derived from every issuer response
//! - a background task that refreshes the access token before it expires
//! - two-phase session-expiry detection driven by `expiry_machine`
//!
//! The engine is cheap to clone. Clones share state.

use crate::access_token::{AccessTokenCacheEntry, AccessTokenInfo, AccessTokenSlot, FetchResult};
use crate::expiry_fsm::{ExpiryDecision, ExpiryMachine, ExpiryMachineInput, ExpiryMachineState};
use crate::monitor::{self, RefreshOutcome};
use crate::user_info::{has_content, UserInfoSlot};
use crate::{
    AuthError, AuthResult, AuthTransport, Clock, Navigator, SystemClock, TOKEN_PATH,
    USER_INFO_PATH,
};
use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;
use session_config_and_utils::{
    extract_token, stringify_url, strip_token_from_url, AuthParams, Config,
};
use session_storage::{SessionStore, StorageResult};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Snapshot of the session as the host sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthState {
    /// The session token. Serialized as a presence flag only.
    #[serde(rename = "has_session_token", serialize_with = "serialize_presence")]
    pub csrf_token: Option<String>,
    pub is_logged_in: bool,
    /// Startup has finished, successfully or not.
    pub is_initialized: bool,
    /// A silent re-authentication is in progress.
    pub did_retry_login: bool,
    pub user_info: Option<Value>,
    /// The silent re-authentication failed.
    pub session_expired: bool,
    /// The issuer answered 403 to the last `/token` call.
    pub last_access_token_invalid: bool,
}

fn serialize_presence<S: Serializer>(token: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_bool(token.is_some())
}

/// Options for [`SessionEngine::authorize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizeOptions {
    /// Marks the redirect as a silent re-authentication attempt.
    pub is_retrying: bool,
}

/// Static engine settings.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Issuer base URL without a trailing slash.
    pub issuer_url: String,
    /// Merged into every authorize URL. Caller parameters win.
    pub default_auth_params: AuthParams,
}

impl EngineOptions {
    pub fn new(issuer_url: &str) -> Self {
        Self {
            issuer_url: issuer_url.trim_end_matches('/').to_string(),
            default_auth_params: AuthParams::new(),
        }
    }

    pub fn with_default_auth_params(mut self, params: AuthParams) -> Self {
        self.default_auth_params = params;
        self
    }

    pub fn from_config(config: &Config) -> AuthResult<Self> {
        Ok(Self::new(&config.issuer_base_url()?)
            .with_default_auth_params(config.default_auth_params.clone()))
    }
}

/// Callback type for state snapshot notifications.
pub type StateCallback = Box<dyn Fn(&AuthState) + Send + Sync>;

struct ExpiryTracker {
    fsm: ExpiryMachine,
    /// `is_logged_in` as of the previous evaluation.
    last_logged_in: bool,
}

pub(crate) struct EngineInner {
    options: EngineOptions,
    store: SessionStore,
    transport: Arc<dyn AuthTransport>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    state: Mutex<AuthState>,
    access_token: AccessTokenSlot,
    user_info: UserInfoSlot,
    monitor: Mutex<Option<JoinHandle<()>>>,
    expiry: Mutex<ExpiryTracker>,
    state_callback: Mutex<Option<Arc<dyn Fn(&AuthState) + Send + Sync>>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(handle) = self.monitor.get_mut().take() {
            handle.abort();
        }
    }
}

/// Client-side session and access-token lifecycle engine.
#[derive(Clone)]
pub struct SessionEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("issuer_url", &self.inner.options.issuer_url)
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

fn or_warn<T: Default>(result: StorageResult<T>, what: &str) -> T {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to read {} from storage", what);
        T::default()
    })
}

impl SessionEngine {
    /// Create an engine, loading the persisted session from `store`.
    pub fn new(
        options: EngineOptions,
        store: SessionStore,
        transport: Arc<dyn AuthTransport>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::with_clock(options, store, transport, navigator, Arc::new(SystemClock))
    }

    /// Create an engine with a custom clock.
    pub fn with_clock(
        options: EngineOptions,
        store: SessionStore,
        transport: Arc<dyn AuthTransport>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = AuthState {
            csrf_token: or_warn(store.session_token(), "session token"),
            is_logged_in: or_warn(store.is_logged_in(), "logged-in flag"),
            user_info: or_warn(store.user_info(), "user info"),
            did_retry_login: or_warn(store.has_retry_marker(), "retry marker"),
            ..AuthState::default()
        };

        let mut fsm = ExpiryMachine::new();
        if state.did_retry_login {
            // Watching -> RetryPending is always allowed
            let _ = fsm.consume(&ExpiryMachineInput::RetryMarkerFound);
        }

        debug!(
            issuer = %options.issuer_url,
            has_session_token = state.csrf_token.is_some(),
            is_logged_in = state.is_logged_in,
            did_retry_login = state.did_retry_login,
            "Session engine created"
        );

        let expiry = ExpiryTracker {
            fsm,
            last_logged_in: state.is_logged_in,
        };

        Self {
            inner: Arc::new(EngineInner {
                options,
                store,
                transport,
                navigator,
                clock,
                state: Mutex::new(state),
                access_token: AccessTokenSlot::default(),
                user_info: UserInfoSlot::default(),
                monitor: Mutex::new(None),
                expiry: Mutex::new(expiry),
                state_callback: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<EngineInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<EngineInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    /// Current state snapshot.
    pub fn state(&self) -> AuthState {
        self.inner.state.lock().clone()
    }

    /// Set a callback to be notified of state changes.
    ///
    /// Fires whenever the snapshot changes and after each background refresh
    /// cycle. The callback may call back into the engine.
    pub fn set_state_callback(&self, callback: StateCallback) {
        *self.inner.state_callback.lock() = Some(Arc::from(callback));
    }

    pub(crate) fn now(&self) -> i64 {
        self.inner.clock.now_millis()
    }

    /// Apply `f` to the state and notify the callback if anything changed.
    fn update_state(&self, f: impl FnOnce(&mut AuthState)) {
        let changed = {
            let mut state = self.inner.state.lock();
            let before = state.clone();
            f(&mut state);
            (*state != before).then(|| state.clone())
        };
        if let Some(snapshot) = changed {
            self.notify_state(&snapshot);
        }
    }

    fn notify_state(&self, state: &AuthState) {
        let callback = self.inner.state_callback.lock().clone();
        if let Some(callback) = callback {
            callback(state);
        }
    }

    pub(crate) fn notify_current_state(&self) {
        let snapshot = self.state();
        self.notify_state(&snapshot);
    }

    // ========================================================================
    // Session token
    // ========================================================================

    fn session_token(&self) -> Option<String> {
        self.inner.state.lock().csrf_token.clone()
    }

    pub fn has_session_token(&self) -> bool {
        self.inner.state.lock().csrf_token.is_some()
    }

    /// A session token is held and the issuer has not rejected it.
    pub fn has_valid_session(&self) -> bool {
        let state = self.inner.state.lock();
        state.csrf_token.is_some() && !state.last_access_token_invalid
    }

    /// Pick up a token from the current URL, falling back to the held one.
    ///
    /// A URL token is persisted immediately.
    pub fn receive_session_token(&self) -> AuthResult<Option<String>> {
        Ok(self.resolve_session_token()?.map(|(token, _)| token))
    }

    /// The token to use, and whether it came from the URL.
    fn resolve_session_token(&self) -> AuthResult<Option<(String, bool)>> {
        if let Some(token) = extract_token(&self.inner.navigator.current_url()) {
            self.set_session_token(&token)?;
            return Ok(Some((token, true)));
        }
        Ok(self.session_token().map(|token| (token, false)))
    }

    fn set_session_token(&self, token: &str) -> AuthResult<()> {
        if self.session_token().as_deref() == Some(token) {
            return Ok(());
        }
        self.inner.store.set_session_token(token)?;

        // Cached fetches belong to the previous token
        self.inner.access_token.clear();
        self.inner.user_info.clear();
        self.update_state(|state| {
            state.csrf_token = Some(token.to_string());
            state.last_access_token_invalid = false;
        });
        info!("Received new session token");
        Ok(())
    }

    fn remove_token_from_url(&self) {
        let current = self.inner.navigator.current_url();
        let stripped = strip_token_from_url(&current);
        if stripped != current {
            self.inner.navigator.replace_url(&stripped);
            debug!("Removed session token from URL");
        }
    }

    /// The engine behind `engine`, if it is alive and still holds
    /// `session_token`. Fetches started under an older token (or before a
    /// logout) must not touch state.
    fn still_holding(engine: &Weak<EngineInner>, session_token: &str) -> Option<Self> {
        let engine = Self::from_inner(engine.upgrade()?);
        if engine.session_token().as_deref() == Some(session_token) {
            Some(engine)
        } else {
            debug!("Session token changed during fetch, discarding side effects");
            None
        }
    }

    fn set_logged_in(&self, logged_in: bool) {
        if let Err(e) = self.inner.store.set_logged_in(logged_in) {
            warn!(error = %e, "Failed to persist logged-in flag");
        }
        if !logged_in {
            self.inner.user_info.clear();
        }

        let was_logged_in = {
            let state = self.inner.state.lock();
            state.is_logged_in
        };
        if was_logged_in != logged_in {
            info!(logged_in, "Login state changed");
        }
        self.update_state(|state| state.is_logged_in = logged_in);
    }

    // ========================================================================
    // Access token
    // ========================================================================

    fn access_token_fetch(&self, session_token: String) -> BoxFuture<'static, FetchResult> {
        let engine = self.downgrade();
        let transport = self.inner.transport.clone();
        let fetched_at = self.now();

        async move {
            debug!("Fetching access token");
            let response = transport.get_json(TOKEN_PATH, &session_token).await;
            let result = AccessTokenCacheEntry::from_transport(response, fetched_at);
            if let Some(engine) = SessionEngine::still_holding(&engine, &session_token) {
                engine.record_access_token(&result);
            }
            result
        }
        .boxed()
    }

    fn record_access_token(&self, result: &FetchResult) {
        match result {
            Ok(entry) if entry.is_error => {
                warn!("Issuer rejected the session token");
                self.update_state(|state| state.last_access_token_invalid = true);
                self.set_logged_in(false);
            }
            Ok(entry) => {
                debug!(valid_until = ?entry.valid_until, "Access token fetched");
                self.update_state(|state| state.last_access_token_invalid = false);
                self.set_logged_in(entry.valid_until.is_some());
            }
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "Access token fetch failed");
            }
        }
    }

    /// Return the cached access token, fetching when absent or expired.
    ///
    /// Concurrent callers share one in-flight fetch. `Ok(None)` means there
    /// is no session token or the issuer rejected it. Transport failures are
    /// returned as errors and leave the cache empty.
    pub async fn get_access_token(&self) -> AuthResult<Option<AccessTokenInfo>> {
        loop {
            let Some(session_token) = self.session_token() else {
                debug!("No session token, skipping access token fetch");
                return Ok(None);
            };

            let (generation, fetch, installed) = self
                .inner
                .access_token
                .get_or_install(|| self.access_token_fetch(session_token));

            match fetch.await {
                Err(e) => {
                    self.inner.access_token.clear_if(generation);
                    return Err(e.into());
                }
                Ok(entry) if entry.is_error => return Ok(None),
                Ok(entry) if installed || entry.is_valid_at(self.now()) => {
                    return Ok(Some(entry.value));
                }
                Ok(_) => {
                    debug!(generation, "Cached access token expired");
                    self.inner.access_token.clear_if(generation);
                }
            }
        }
    }

    /// Fetch a new access token, replacing whatever is cached.
    ///
    /// Without a session token this returns an empty `AccessTokenInfo`.
    pub async fn fetch_access_token(&self) -> AuthResult<AccessTokenInfo> {
        let Some(session_token) = self.session_token() else {
            return Ok(AccessTokenInfo::default());
        };

        let (generation, fetch) = self
            .inner
            .access_token
            .install(self.access_token_fetch(session_token));

        match fetch.await {
            Ok(entry) => Ok(entry.value),
            Err(e) => {
                self.inner.access_token.clear_if(generation);
                Err(e.into())
            }
        }
    }

    /// Claims of the current access token.
    pub async fn get_access_claims<T: DeserializeOwned>(&self) -> AuthResult<Option<T>> {
        match self.get_access_token().await? {
            Some(info) => Ok(info.claims_as()?),
            None => Ok(None),
        }
    }

    /// The encoded access token.
    pub async fn get_access_token_string(&self) -> AuthResult<Option<String>> {
        Ok(self.get_access_token().await?.and_then(|info| info.token))
    }

    /// Expiry of the cached access token, if a fetch has completed.
    pub fn access_token_valid_until(&self) -> Option<i64> {
        self.inner.access_token.peek().and_then(|entry| entry.valid_until)
    }

    // ========================================================================
    // User info
    // ========================================================================

    fn user_info_fetch(&self, session_token: String) -> BoxFuture<'static, Option<Value>> {
        let engine = self.downgrade();
        let transport = self.inner.transport.clone();

        async move {
            debug!("Fetching user info");
            let response = transport.get_json(USER_INFO_PATH, &session_token).await;
            let engine = SessionEngine::still_holding(&engine, &session_token);

            match response {
                Ok(user_info) if has_content(&user_info) => {
                    if let Some(engine) = engine {
                        engine.record_user_info(&user_info);
                    }
                    Some(user_info)
                }
                Ok(_) => {
                    debug!("Issuer returned empty user info");
                    None
                }
                Err(e) if e.is_session_invalid() => {
                    warn!("Issuer rejected the session token for user info");
                    if let Some(engine) = engine {
                        engine.set_logged_in(false);
                    }
                    None
                }
                Err(e) => {
                    warn!(error = %e, "User info fetch failed");
                    None
                }
            }
        }
        .boxed()
    }

    fn record_user_info(&self, user_info: &Value) {
        if let Err(e) = self.inner.store.set_user_info(user_info) {
            warn!(error = %e, "Failed to persist user info");
        }
        self.update_state(|state| state.user_info = Some(user_info.clone()));
        self.set_logged_in(true);
    }

    /// The identity payload.
    ///
    /// Trusts the persisted snapshot while logged in. Otherwise awaits the
    /// cached fetch or starts one.
    pub async fn get_user_info_value(&self) -> Option<Value> {
        {
            let state = self.inner.state.lock();
            if state.is_logged_in {
                if let Some(user_info) = &state.user_info {
                    return Some(user_info.clone());
                }
            }
        }

        if let Some(cached) = self.inner.user_info.current() {
            return cached.await;
        }
        self.fetch_user_info().await
    }

    /// The identity payload as a caller-defined type.
    pub async fn get_user_info<T: DeserializeOwned>(&self) -> AuthResult<Option<T>> {
        match self.get_user_info_value().await {
            Some(user_info) => Ok(Some(serde_json::from_value(user_info)?)),
            None => Ok(None),
        }
    }

    /// Fetch the identity payload, replacing whatever is cached.
    pub async fn fetch_user_info(&self) -> Option<Value> {
        let session_token = self.session_token()?;
        let fetch = self.inner.user_info.install(self.user_info_fetch(session_token));
        fetch.await
    }

    // ========================================================================
    // Startup
    // ========================================================================

    /// Run the startup sequence and mark the engine initialized.
    ///
    /// `is_initialized` becomes true even when a step fails.
    pub async fn load_initial_data(&self) -> AuthResult<()> {
        let result = self.run_startup().await;
        self.update_state(|state| state.is_initialized = true);

        let state = self.state();
        info!(
            is_logged_in = state.is_logged_in,
            has_session_token = state.csrf_token.is_some(),
            "Session initialized"
        );
        result
    }

    async fn run_startup(&self) -> AuthResult<()> {
        self.note_retry_marker()?;

        let Some((_, from_url)) = self.resolve_session_token()? else {
            debug!("No session token, starting anonymous");
            return Ok(());
        };

        let user_info = self.get_user_info_value().await;
        if from_url {
            self.remove_token_from_url();
        }
        if !user_info.as_ref().is_some_and(has_content) {
            return Ok(());
        }

        if let Err(e) = self.get_access_token().await {
            warn!(error = %e, "Initial access token fetch failed");
        }
        Ok(())
    }

    fn note_retry_marker(&self) -> AuthResult<()> {
        if !self.inner.store.has_retry_marker()? {
            return Ok(());
        }
        {
            let mut expiry = self.inner.expiry.lock();
            if *expiry.fsm.state() != ExpiryMachineState::Expired {
                transition(&mut expiry.fsm, &ExpiryMachineInput::RetryMarkerFound)?;
            }
        }
        self.update_state(|state| state.did_retry_login = true);
        Ok(())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Build the issuer's authorize URL.
    ///
    /// `redirect_uri` defaults to the current URL without its token.
    pub fn authorize_url(&self, params: &AuthParams) -> AuthResult<String> {
        let mut query = self.inner.options.default_auth_params.clone();
        query.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        if query.get("redirect_uri").map_or(true, String::is_empty) {
            let current = strip_token_from_url(&self.inner.navigator.current_url());
            query.insert("redirect_uri".to_string(), current);
        }

        let base = format!("{}/authorize", self.inner.options.issuer_url);
        Ok(stringify_url(&base, &query)?)
    }

    /// Build the issuer's logout URL.
    ///
    /// `post_logout_redirect_uri` defaults to the current URL.
    pub fn logout_url(&self, params: &AuthParams) -> AuthResult<String> {
        let mut query = params.clone();
        if query
            .get("post_logout_redirect_uri")
            .map_or(true, String::is_empty)
        {
            query.insert(
                "post_logout_redirect_uri".to_string(),
                self.inner.navigator.current_url(),
            );
        }

        let base = format!("{}/logout", self.inner.options.issuer_url);
        Ok(stringify_url(&base, &query)?)
    }

    /// Soft-reset local identity and navigate to the authorize URL.
    pub fn authorize(&self, params: &AuthParams, options: AuthorizeOptions) -> AuthResult<String> {
        let url = self.authorize_url(params)?;
        self.inner.store.reset_identity(false)?;
        if options.is_retrying {
            self.inner.store.set_retry_marker()?;
            self.update_state(|state| state.did_retry_login = true);
        }

        info!(is_retrying = options.is_retrying, "Redirecting to authorize");
        self.inner.navigator.assign(&url);
        Ok(url)
    }

    /// Drop the whole local session and navigate to the logout URL.
    pub fn logout(&self, params: &AuthParams) -> AuthResult<String> {
        let url = self.logout_url(params)?;
        self.stop_monitoring_access_token();
        self.inner.access_token.clear();
        self.inner.user_info.clear();
        self.inner.store.reset_identity(true)?;
        self.update_state(|state| {
            state.csrf_token = None;
            state.is_logged_in = false;
            state.user_info = None;
            state.last_access_token_invalid = false;
        });
        // A deliberate logout is not a lost login
        self.inner.expiry.lock().last_logged_in = false;

        info!("Logging out");
        self.inner.navigator.assign(&url);
        Ok(url)
    }

    /// Clear persisted identity, optionally including the session token.
    pub fn reset_storage(&self, reset_session_token: bool) -> AuthResult<()> {
        self.inner.store.reset_identity(reset_session_token)?;
        if reset_session_token {
            self.inner.access_token.clear();
            self.inner.user_info.clear();
            self.update_state(|state| state.csrf_token = None);
        }
        debug!(reset_session_token, "Session storage reset");
        Ok(())
    }

    // ========================================================================
    // Monitoring
    // ========================================================================

    /// Start refreshing the access token in the background.
    ///
    /// Replaces a running monitor. Requires a tokio runtime.
    pub fn monitor_access_token(&self) -> AuthResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            AuthError::Config("access token monitoring requires a tokio runtime".to_string())
        })?;

        let mut handle = self.inner.monitor.lock();
        if let Some(previous) = handle.take() {
            previous.abort();
            debug!("Replacing running access token monitor");
        }
        *handle = Some(runtime.spawn(monitor::run(self.downgrade())));
        info!("Access token monitoring started");
        Ok(())
    }

    /// Stop the background refresh. Safe to call when nothing runs.
    pub fn stop_monitoring_access_token(&self) {
        if let Some(handle) = self.inner.monitor.lock().take() {
            handle.abort();
            info!("Access token monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner
            .monitor
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// One background refresh.
    ///
    /// The first cycle reuses a fetch already in the cache; later cycles
    /// always fetch.
    pub(crate) async fn refresh_cycle(&self, first: bool) -> RefreshOutcome {
        let Some(session_token) = self.session_token() else {
            return RefreshOutcome::Stop;
        };

        let current = if first { self.inner.access_token.current() } else { None };
        let (generation, fetch) = match current {
            Some(current) => current,
            None => self
                .inner
                .access_token
                .install(self.access_token_fetch(session_token)),
        };

        match fetch.await {
            Ok(entry) if entry.is_error => RefreshOutcome::Stop,
            Ok(entry) => entry
                .valid_until
                .map_or(RefreshOutcome::Stop, RefreshOutcome::RefreshBefore),
            Err(e) => {
                self.inner.access_token.clear_if(generation);
                debug!(error = %e, "Background refresh failed, will retry");
                RefreshOutcome::Retry
            }
        }
    }

    // ========================================================================
    // Session expiry
    // ========================================================================

    /// Evaluate session expiry against the current state.
    ///
    /// Call after startup and whenever the state changes. Losing the login
    /// issues one silent re-authentication; the verdict comes on the next
    /// start, when the retry marker is found.
    pub fn observe_session_expiry(&self) -> AuthResult<ExpiryDecision> {
        let state = self.state();
        let mut expiry = self.inner.expiry.lock();
        let was_logged_in = std::mem::replace(&mut expiry.last_logged_in, state.is_logged_in);
        let fsm_state = expiry.fsm.state().clone();

        match fsm_state {
            ExpiryMachineState::RetryPending if state.is_initialized => {
                let input = if state.is_logged_in {
                    ExpiryMachineInput::SessionRestored
                } else {
                    ExpiryMachineInput::SessionLost
                };
                transition(&mut expiry.fsm, &input)?;
                drop(expiry);

                self.inner.store.clear_retry_marker()?;
                self.update_state(|state| state.did_retry_login = false);

                if state.is_logged_in {
                    info!("Silent re-authentication restored the session");
                    return Ok(ExpiryDecision::SessionRestored);
                }

                warn!("Session expired");
                self.inner.store.reset_identity(false)?;
                self.update_state(|state| state.session_expired = true);
                Ok(ExpiryDecision::SessionExpired)
            }
            ExpiryMachineState::Watching if was_logged_in && !state.is_logged_in => {
                transition(&mut expiry.fsm, &ExpiryMachineInput::LoginLost)?;
                drop(expiry);

                info!("Login lost, attempting silent re-authentication");
                let params = AuthParams::from([("prompt".to_string(), "none".to_string())]);
                self.authorize(&params, AuthorizeOptions { is_retrying: true })?;
                Ok(ExpiryDecision::RetryingLogin)
            }
            _ => Ok(ExpiryDecision::Unchanged),
        }
    }

    /// Current state of the expiry machine.
    pub fn expiry_state(&self) -> ExpiryMachineState {
        self.inner.expiry.lock().fsm.state().clone()
    }
}

/// Transition the expiry machine, logging the change.
fn transition(fsm: &mut ExpiryMachine, input: &ExpiryMachineInput) -> AuthResult<()> {
    let old_state = fsm.state().clone();
    fsm.consume(input).map_err(|_| {
        AuthError::InvalidStateTransition(format!(
            "Cannot apply {:?} in state {:?}",
            input,
            fsm.state()
        ))
    })?;

    if old_state != *fsm.state() {
        debug!(
            old_state = ?old_state,
            new_state = ?fsm.state(),
            "Session expiry transition"
        );
    }
    Ok(())
}
