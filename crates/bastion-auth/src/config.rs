//! Authentication configuration.

use serde::Deserialize;

/// Configuration for token issuance, password checks and the credential
/// cookie.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC-SHA256 signing secret.
    pub jwt_secret: String,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// JWT audience (`aud` claim).
    pub jwt_audience: String,
    /// Access token lifetime in days (default: 7).
    pub token_lifetime_days: i64,
    /// Lifetime of tokens from [`crate::TokenService::generate_simple_token`] (default: 1).
    pub simple_token_lifetime_days: i64,
    /// Reject expired tokens on validation (default: false).
    pub validate_lifetime: bool,
    /// Role claim written for users without roles.
    pub default_role: String,
    /// Avatar claim written for users without an avatar.
    pub default_avatar: String,
    /// Optional pepper prepended to passwords before Argon2id verification.
    pub pepper: Option<String>,
    /// Name of the credential cookie.
    pub cookie_name: String,
    /// `Max-Age` of the credential cookie in seconds (default: 1800).
    pub cookie_max_age_secs: u64,
    /// Refresh record lifetime in days (default: 30).
    pub refresh_token_lifetime_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: "bastion".into(),
            jwt_audience: "bastion".into(),
            token_lifetime_days: 7,
            simple_token_lifetime_days: 1,
            validate_lifetime: false,
            default_role: "User".into(),
            default_avatar: "images/default-avatar.png".into(),
            pepper: None,
            cookie_name: "bastion_token".into(),
            cookie_max_age_secs: 1800,
            refresh_token_lifetime_days: 30,
        }
    }
}
