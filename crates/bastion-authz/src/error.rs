//! Authorization-layer error type.

use bastion_cache::CacheError;
use bastion_core::error::BastionError;

/// Errors raised while computing a decision. Converted to
/// [`BastionError`] at the service boundary.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Repository(#[from] BastionError),
}

impl From<AuthzError> for BastionError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Cache(e) => BastionError::Internal(e.to_string()),
            AuthzError::Repository(e) => e,
        }
    }
}
