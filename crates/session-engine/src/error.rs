//! Engine error types.

use thiserror::Error;

/// Failure of a call to the issuer's `/token` or `/userinfo` endpoint.
///
/// `Clone` so one in-flight fetch can be shared by every waiting caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Non-2xx response
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response
    #[error("Request failed: {message}")]
    Request { message: String, transient: bool },

    /// The response body was not the expected JSON
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// Status code, when the issuer answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// A 403 means the session token is no longer accepted.
    pub fn is_session_invalid(&self) -> bool {
        self.status() == Some(403)
    }

    /// Returns true for connect/timeout failures and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Status { status, .. } => (500..600).contains(status),
            TransportError::Request { transient, .. } => *transient,
            TransportError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return TransportError::Status {
                status: status.as_u16(),
                message: e.to_string(),
            };
        }
        if e.is_decode() {
            return TransportError::Decode(e.to_string());
        }
        TransportError::Request {
            transient: e.is_connect() || e.is_timeout(),
            message: e.to_string(),
        }
    }
}

/// Session engine error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Issuer call failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] session_storage::StorageError),

    /// Configuration or path error
    #[error(transparent)]
    Core(#[from] session_config_and_utils::CoreError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid transition in the session-expiry FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Transport(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> TransportError {
        TransportError::Status {
            status,
            message: "Error fetching JSON".to_string(),
        }
    }

    #[test]
    fn test_403_is_session_invalid() {
        assert!(status(403).is_session_invalid());
        assert!(!status(401).is_session_invalid());
        assert!(!TransportError::Decode("eof".into()).is_session_invalid());
    }

    #[test]
    fn test_is_transient_server_error() {
        assert!(status(502).is_transient());
        assert!(AuthError::Transport(status(503)).is_transient());
    }

    #[test]
    fn test_is_transient_request_failure() {
        let timeout = TransportError::Request {
            message: "timed out".into(),
            transient: true,
        };
        assert!(timeout.is_transient());
        assert_eq!(timeout.status(), None);
    }

    #[test]
    fn test_is_not_transient_client_error() {
        assert!(!status(403).is_transient());
        assert!(!status(404).is_transient());
        assert!(!AuthError::Config("bad".into()).is_transient());
    }
}
