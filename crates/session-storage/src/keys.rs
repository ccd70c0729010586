//! Storage key constants.

/// Storage keys used by the session engine
pub struct StorageKeys;

impl StorageKeys {
    /// Session (CSRF) token delivered by the issuer redirect
    pub const CSRF_TOKEN: &'static str = "oidc_jwt_provider_token";

    /// Logged-in flag (JSON boolean)
    pub const LOGGED_IN: &'static str = "oidc_jwt_provider_logged_in";

    /// Last known identity payload (JSON object)
    pub const USER_INFO: &'static str = "oidc_jwt_provider_user_info";

    /// Set while a silent re-login redirect is in flight
    pub const RETRY_LOGIN: &'static str = "oidc_jwt_provider_retry_login";

    /// All keys owned by the session engine.
    pub const ALL: [&'static str; 4] = [
        Self::CSRF_TOKEN,
        Self::LOGGED_IN,
        Self::USER_INFO,
        Self::RETRY_LOGIN,
    ];
}
