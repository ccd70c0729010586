//! Background access-token refresh loop.

use crate::access_token::{refresh_delay, MIN_REFRESH_DELAY_MS};
use crate::engine::{EngineInner, SessionEngine};
use std::sync::Weak;
use std::time::Duration;
use tracing::debug;

/// What one refresh cycle decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshOutcome {
    /// Refresh again shortly before this epoch-millis expiry.
    RefreshBefore(i64),
    /// The fetch failed; try again after the minimum delay.
    Retry,
    /// Nothing left to refresh.
    Stop,
}

/// Refresh the access token until there is nothing left to refresh.
///
/// Holds only a weak reference between cycles, so dropping the last engine
/// handle ends the loop.
pub(crate) async fn run(engine: Weak<EngineInner>) {
    let mut first = true;
    loop {
        let Some(inner) = engine.upgrade() else {
            return;
        };
        let engine = SessionEngine::from_inner(inner);

        let outcome = engine.refresh_cycle(first).await;
        first = false;
        engine.notify_current_state();

        let delay_ms = match outcome {
            RefreshOutcome::RefreshBefore(valid_until) => refresh_delay(valid_until, engine.now()),
            RefreshOutcome::Retry => MIN_REFRESH_DELAY_MS,
            RefreshOutcome::Stop => {
                debug!("Access token monitor finished");
                return;
            }
        };
        drop(engine);

        debug!(delay_ms, "Next access token refresh scheduled");
        tokio::time::sleep(Duration::from_millis(delay_ms as u64)).await;
    }
}
