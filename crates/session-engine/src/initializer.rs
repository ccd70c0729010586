//! Host-facing session runtime.
//!
//! Wraps a [`SessionEngine`] with the startup flow: load the session, settle
//! any pending silent re-authentication, start or stop monitoring as the
//! login state changes, and optionally attempt a silent login.

use crate::engine::{AuthState, AuthorizeOptions, SessionEngine};
use crate::expiry_fsm::{ExpiryDecision, ExpiryMachineState};
use crate::AuthResult;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use session_config_and_utils::{AuthParams, Config};
use tracing::{debug, info};

/// Startup behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializerOptions {
    /// Redirect to a `prompt=none` authorize when there is no session.
    pub should_attempt_login: bool,
    /// Refresh the access token in the background while logged in.
    pub should_monitor_access_tokens: bool,
}

impl Default for InitializerOptions {
    fn default() -> Self {
        Self {
            should_attempt_login: false,
            should_monitor_access_tokens: true,
        }
    }
}

impl InitializerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            should_attempt_login: config.should_attempt_login,
            should_monitor_access_tokens: config.should_monitor_access_tokens,
        }
    }
}

/// How [`SessionInitializer::start`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// The session is loaded; render.
    Ready,
    /// A navigation to the issuer was issued.
    Redirecting,
    /// Silent re-authentication failed.
    SessionExpired,
}

/// Snapshot of the session for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub authenticated: bool,
    pub has_session_token: bool,
    pub is_initialized: bool,
    pub session_expired: bool,
    pub user_info: Option<Value>,
    /// Epoch millis.
    pub access_token_valid_until: Option<i64>,
    pub monitoring: bool,
    pub expiry_state: String,
}

/// Drives a [`SessionEngine`] through startup and login-state changes.
#[derive(Debug)]
pub struct SessionInitializer {
    engine: SessionEngine,
    options: InitializerOptions,
    /// `is_logged_in` the monitor was last synced to.
    monitored_login: Mutex<Option<bool>>,
}

impl SessionInitializer {
    pub fn new(engine: SessionEngine, options: InitializerOptions) -> Self {
        Self {
            engine,
            options,
            monitored_login: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    pub fn options(&self) -> InitializerOptions {
        self.options
    }

    /// Load the session and settle what to do with it.
    pub async fn start(&self) -> AuthResult<StartOutcome> {
        self.engine.load_initial_data().await?;

        match self.engine.observe_session_expiry()? {
            ExpiryDecision::SessionExpired => return Ok(StartOutcome::SessionExpired),
            ExpiryDecision::RetryingLogin => return Ok(StartOutcome::Redirecting),
            ExpiryDecision::Unchanged | ExpiryDecision::SessionRestored => {}
        }

        let state = self.engine.state();
        self.sync_monitoring(state.is_logged_in)?;

        if !state.is_logged_in && self.options.should_attempt_login && state.csrf_token.is_none() {
            info!("No session, attempting silent login");
            let params = AuthParams::from([("prompt".to_string(), "none".to_string())]);
            self.engine.authorize(&params, AuthorizeOptions::default())?;
            return Ok(StartOutcome::Redirecting);
        }

        debug!(is_logged_in = state.is_logged_in, "Session ready");
        Ok(StartOutcome::Ready)
    }

    /// React to a new state snapshot.
    ///
    /// Starts or stops monitoring on login transitions and evaluates session
    /// expiry. Call from outside the state callback, e.g. after receiving
    /// the snapshot over a channel.
    pub fn sync(&self, state: &AuthState) -> AuthResult<ExpiryDecision> {
        self.sync_monitoring(state.is_logged_in)?;
        self.engine.observe_session_expiry()
    }

    fn sync_monitoring(&self, is_logged_in: bool) -> AuthResult<()> {
        let mut monitored = self.monitored_login.lock();
        if *monitored == Some(is_logged_in) {
            return Ok(());
        }
        *monitored = Some(is_logged_in);

        if !is_logged_in {
            self.engine.stop_monitoring_access_token();
        } else if self.options.should_monitor_access_tokens {
            self.engine.monitor_access_token()?;
        }
        Ok(())
    }

    /// Whether the host should hold rendering.
    ///
    /// True while a silent login is about to be attempted: no session token,
    /// login attempts enabled and not logged in.
    pub fn is_blocking_render(&self) -> bool {
        let state = self.engine.state();
        self.options.should_attempt_login && state.csrf_token.is_none() && !state.is_logged_in
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.engine.state();
        let expiry_state = match self.engine.expiry_state() {
            ExpiryMachineState::Watching => "watching",
            ExpiryMachineState::Redirecting => "redirecting",
            ExpiryMachineState::RetryPending => "retry_pending",
            ExpiryMachineState::Expired => "expired",
        };

        SessionSnapshot {
            authenticated: state.is_logged_in,
            has_session_token: state.csrf_token.is_some(),
            is_initialized: state.is_initialized,
            session_expired: state.session_expired,
            user_info: state.user_info,
            access_token_valid_until: self.engine.access_token_valid_until(),
            monitoring: self.engine.is_monitoring(),
            expiry_state: expiry_state.to_string(),
        }
    }
}
