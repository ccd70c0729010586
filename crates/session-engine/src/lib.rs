//! Client-side session and access-token lifecycle engine.
//!
//! This crate provides:
//! - Session token pickup from the redirect URL, persisted across restarts
//! - A deduplicating access-token cache keyed on the token's own lifetime
//! - Background refresh ahead of access-token expiry
//! - Identity (user info) caching with a trust-the-snapshot fast path
//! - Authorize / logout navigation targets for the issuer
//! - Explicit FSM-based two-phase session-expiry detection

mod access_token;
mod clock;
mod engine;
mod error;
mod expiry_fsm;
mod initializer;
mod monitor;
mod navigator;
mod transport;
mod user_info;

pub use access_token::{
    refresh_delay, AccessTokenCacheEntry, AccessTokenInfo, MIN_REFRESH_DELAY_MS, REFRESH_LEAD_MS,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{AuthState, AuthorizeOptions, EngineOptions, SessionEngine, StateCallback};
pub use error::{AuthError, AuthResult, TransportError};
pub use expiry_fsm::expiry_machine;
pub use expiry_fsm::{ExpiryDecision, ExpiryMachine, ExpiryMachineInput, ExpiryMachineState};
pub use initializer::{InitializerOptions, SessionInitializer, SessionSnapshot, StartOutcome};
pub use navigator::{MemoryNavigator, Navigator};
pub use transport::{AuthTransport, HttpTransport, TOKEN_PATH, USER_INFO_PATH};

#[cfg(test)]
mod tests;
