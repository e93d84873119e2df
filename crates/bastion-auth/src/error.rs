//! Authentication error types.

use bastion_core::error::BastionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is locked")]
    AccountLocked,

    #[error("account is inactive")]
    AccountInactive,

    #[error("account is pending verification")]
    AccountPendingVerification,

    #[error("no credential was presented")]
    CredentialMissing,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("refresh token is unknown, superseded or expired")]
    RefreshRejected,

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for BastionError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountLocked
            | AuthError::AccountInactive
            | AuthError::AccountPendingVerification => BastionError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::CredentialMissing => {
                BastionError::unauthorized("credential_missing", err.to_string())
            }
            AuthError::TokenExpired => BastionError::unauthorized("token_expired", err.to_string()),
            AuthError::TokenInvalid(_) => {
                BastionError::unauthorized("token_invalid", err.to_string())
            }
            AuthError::RefreshRejected => {
                BastionError::unauthorized("refresh_rejected", err.to_string())
            }
            AuthError::Crypto(msg) => BastionError::Crypto(msg),
        }
    }
}
