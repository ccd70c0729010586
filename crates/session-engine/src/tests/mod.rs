//! Integration tests for the session engine.
//!
//! - `harness.rs`      - Scripted transport, counting storage and engine builder
//! - `access_token.rs` - Access-token cache: hits, refetch, dedup, 403, failures
//! - `startup.rs`      - Startup sequence and URL token handling
//! - `navigation.rs`   - Authorize, logout and storage resets
//! - `expiry.rs`       - Two-phase session-expiry detection
//! - `monitor.rs`      - Background refresh scheduling (paused tokio time)
//! - `initializer.rs`  - Startup orchestration and monitoring sync

pub(crate) mod harness;
mod startup;
