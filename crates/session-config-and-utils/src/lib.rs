//! Core types, configuration, and utilities for the OIDC JWT session engine.

mod config;
mod error;
mod logging;
mod paths;
pub mod querystring;
pub mod url_token;

pub use config::{AuthParams, Config, CsrfTokenMethod, DEFAULT_ISSUER_URL, DEFAULT_LOG_LEVEL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
pub use querystring::stringify_url;
pub use url_token::{extract_token, strip_token_from_url, TOKEN_PARAM};
