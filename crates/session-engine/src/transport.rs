//! Authenticated JSON fetches against the issuer.

use crate::{AuthError, AuthResult, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use session_config_and_utils::{Config, CsrfTokenMethod, TOKEN_PARAM};
use std::time::Duration;
use tracing::debug;

/// Issuer path for access-token fetches.
pub const TOKEN_PATH: &str = "/token";
/// Issuer path for identity fetches.
pub const USER_INFO_PATH: &str = "/userinfo";

/// Fetches JSON from the issuer using the session token as credential.
#[async_trait]
pub trait AuthTransport: Send + Sync {
    /// `GET {issuer}{path}`. Non-2xx responses map to `TransportError::Status`.
    async fn get_json(&self, path: &str, session_token: &str) -> Result<Value, TransportError>;
}

/// reqwest-backed transport.
///
/// Keeps cookies across requests so issuer session cookies travel with
/// every call.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    csrf_token_method: CsrfTokenMethod,
}

impl HttpTransport {
    /// Create a transport for `base_url`. `timeout = None` waits indefinitely.
    pub fn new(
        base_url: &str,
        csrf_token_method: CsrfTokenMethod,
        timeout: Option<Duration>,
    ) -> AuthResult<Self> {
        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AuthError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_token_method,
        })
    }

    /// Create a transport from the configured issuer, delivery method and timeout.
    pub fn from_config(config: &Config) -> AuthResult<Self> {
        Self::new(
            &config.issuer_base_url()?,
            config.csrf_token_method,
            config.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AuthTransport for HttpTransport {
    async fn get_json(&self, path: &str, session_token: &str) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, method = ?self.csrf_token_method, "Fetching JSON from issuer");

        let request = match self.csrf_token_method {
            CsrfTokenMethod::Header => self.client.get(&url).bearer_auth(session_token),
            CsrfTokenMethod::Querystring => {
                self.client.get(&url).query(&[(TOKEN_PARAM, session_token)])
            }
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = status.as_u16(), "Issuer returned error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: "Error fetching JSON".to_string(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}
