//! Command implementations.

use serde_json::json;
use session_config_and_utils::{Config, Paths};
use session_engine::{
    EngineOptions, ExpiryDecision, HttpTransport, InitializerOptions, MemoryNavigator,
    SessionEngine, SessionInitializer,
};
use session_storage::{FileStorage, SessionStore};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

type AppResult<T> = Result<T, Box<dyn Error>>;

/// An engine over the on-disk session store, landing on a given URL.
pub struct Session {
    initializer: SessionInitializer,
    navigator: Arc<MemoryNavigator>,
}

impl Session {
    pub fn open(config: &Config, paths: &Paths, url: &str) -> AppResult<Self> {
        paths.ensure_dirs()?;
        let storage = FileStorage::open(config.storage_file(paths))?;
        debug!(path = %storage.path().display(), "Opened session store");

        let transport = HttpTransport::from_config(config)?;
        let navigator = Arc::new(MemoryNavigator::new(url));
        let engine = SessionEngine::new(
            EngineOptions::from_config(config)?,
            SessionStore::new(Arc::new(storage)),
            Arc::new(transport),
            navigator.clone(),
        );

        Ok(Self {
            initializer: SessionInitializer::new(engine, InitializerOptions::from_config(config)),
            navigator,
        })
    }

    pub fn engine(&self) -> &SessionEngine {
        self.initializer.engine()
    }
}

/// Parse a `key=value` query parameter.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}

pub async fn status(session: &Session) -> AppResult<()> {
    let outcome = session.initializer.start().await?;
    let report = json!({
        "outcome": outcome,
        "session": session.initializer.snapshot(),
        "stripped_url": session.navigator.replacements().last(),
        "navigated_to": session.navigator.last_assignment(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    session.engine().stop_monitoring_access_token();
    Ok(())
}

pub async fn token(session: &Session) -> AppResult<()> {
    let engine = session.engine();
    engine.load_initial_data().await?;

    match engine.get_access_token().await? {
        Some(info) => {
            let report = json!({
                "claims": info.claims,
                "valid_until": engine.access_token_valid_until(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        None => {
            info!("No access token available");
            println!("null");
        }
    }
    Ok(())
}

/// Run the refresh loop for `seconds`, printing every state snapshot.
pub async fn monitor(session: &Session, seconds: u64) -> AppResult<()> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    session.engine().set_state_callback(Box::new(move |state| {
        let _ = tx.send(state.clone());
    }));

    let outcome = session.initializer.start().await?;
    info!(?outcome, seconds, "Monitoring session");
    if !session.engine().is_monitoring() {
        session.engine().monitor_access_token()?;
    }

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            Some(state) = rx.recv() => {
                println!("{}", serde_json::to_string(&state)?);
                let decision = session.initializer.sync(&state)?;
                if decision != ExpiryDecision::Unchanged {
                    info!(?decision, "Session expiry decision");
                }
            }
        }
    }

    session.engine().stop_monitoring_access_token();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("prompt=none").unwrap(),
            ("prompt".to_string(), "none".to_string())
        );
        assert_eq!(
            parse_param("scope=openid email").unwrap().1,
            "openid email"
        );
        assert_eq!(parse_param("flag=").unwrap().1, "");
        assert!(parse_param("=x").is_err());
        assert!(parse_param("nothing").is_err());
    }
}
