//! Session-expiry detection state machine using rust-fsm.
//!
//! Expiry is judged in two phases. Losing the login triggers one silent
//! re-authentication redirect; the verdict is reached only when the page
//! comes back with the retry marker set.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐  LoginLost   ┌─────────────────┐
//! │    Watching     │ ───────────► │   Redirecting   │
//! └────────┬────────┘              └────────┬────────┘
//!          │ RetryMarkerFound               │ RetryMarkerFound
//!          ▼                                ▼
//! ┌─────────────────────────────────────────────────┐
//! │                  RetryPending                   │
//! └────────┬───────────────────────────────┬────────┘
//!          │ SessionRestored               │ SessionLost
//!          ▼                               ▼
//!      Watching                    ┌─────────────────┐
//!                                  │     Expired     │ (terminal)
//!                                  └─────────────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub expiry_machine(Watching)

    Watching => {
        LoginLost => Redirecting,
        RetryMarkerFound => RetryPending
    },
    Redirecting => {
        RetryMarkerFound => RetryPending
    },
    RetryPending => {
        RetryMarkerFound => RetryPending,
        SessionRestored => Watching,
        SessionLost => Expired
    }
}

pub use expiry_machine::Input as ExpiryMachineInput;
pub use expiry_machine::State as ExpiryMachineState;
pub use expiry_machine::StateMachine as ExpiryMachine;

/// Outcome of one session-expiry evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryDecision {
    /// Nothing to do.
    Unchanged,
    /// The login was lost; a silent re-authentication redirect was issued.
    RetryingLogin,
    /// The silent re-authentication succeeded.
    SessionRestored,
    /// The silent re-authentication failed. Terminal.
    SessionExpired,
}
