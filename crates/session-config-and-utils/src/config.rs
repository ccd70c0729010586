//! Configuration management for the session engine.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// Default issuer URL used when nothing is configured.
pub const DEFAULT_ISSUER_URL: &str = "http://localhost:3000";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Query parameters passed to the issuer's `/authorize` and `/logout` endpoints.
///
/// Ordered so the generated query strings are stable.
pub type AuthParams = BTreeMap<String, String>;

/// How the session (CSRF) token is delivered to the issuer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsrfTokenMethod {
    /// `Authorization: Bearer <token>` header.
    #[default]
    Header,
    /// `token` query parameter on the endpoint URL.
    Querystring,
}

impl FromStr for CsrfTokenMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "header" => Ok(Self::Header),
            "querystring" | "query" => Ok(Self::Querystring),
            other => Err(CoreError::Config(format!(
                "unknown csrf token method: {other}"
            ))),
        }
    }
}

/// Session engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the token issuing service.
    #[serde(default = "default_issuer_url")]
    pub issuer_url: String,
    /// Session token delivery method.
    #[serde(default)]
    pub csrf_token_method: CsrfTokenMethod,
    /// Parameters merged under every `authorize` call.
    #[serde(default)]
    pub default_auth_params: AuthParams,
    /// Attempt a silent login when no session token is known.
    #[serde(default)]
    pub should_attempt_login: bool,
    /// Keep the access token warm in the background while logged in.
    #[serde(default = "default_true")]
    pub should_monitor_access_tokens: bool,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Request timeout for issuer calls. `None` waits indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Location of the JSON session store. Defaults to `Paths::session_file`.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

fn default_issuer_url() -> String {
    DEFAULT_ISSUER_URL.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            issuer_url: default_issuer_url(),
            csrf_token_method: CsrfTokenMethod::default(),
            default_auth_params: AuthParams::new(),
            should_attempt_login: false,
            should_monitor_access_tokens: true,
            log_level: default_log_level(),
            request_timeout_secs: None,
            storage_path: None,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from `config.json` under `paths`, falling back to
    /// defaults, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(issuer_url) = lookup("OIDC_JWT_ISSUER_URL") {
            self.issuer_url = issuer_url;
        }
        if let Some(log_level) = lookup("OIDC_JWT_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(method) = lookup("OIDC_JWT_CSRF_TOKEN_METHOD") {
            match method.parse() {
                Ok(method) => self.csrf_token_method = method,
                Err(e) => tracing::warn!(error = %e, "Ignoring OIDC_JWT_CSRF_TOKEN_METHOD"),
            }
        }
    }

    /// The issuer URL, validated, without a trailing `/`.
    pub fn issuer_base_url(&self) -> CoreResult<String> {
        let url = Url::parse(&self.issuer_url)?;
        if url.cannot_be_a_base() {
            return Err(CoreError::Config(format!(
                "issuer url cannot be a base: {}",
                self.issuer_url
            )));
        }
        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    /// Request timeout as a duration, if one is configured.
    pub fn request_timeout(&self) -> Option<std::time::Duration> {
        self.request_timeout_secs.map(std::time::Duration::from_secs)
    }

    /// Resolve the session store location.
    pub fn storage_file(&self, paths: &Paths) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(|| paths.session_file())
    }
}
