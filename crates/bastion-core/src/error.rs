//! Error types for the Bastion system.

use thiserror::Error;

/// Boxed inner cause carried by [`BastionError::Transaction`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum BastionError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// Missing or invalid credential. `code` is stable and safe to return
    /// to clients.
    #[error("Unauthorized ({code}): {reason}")]
    Unauthorized { code: &'static str, reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Transaction failed: {0}")]
    Transaction(#[source] BoxedCause),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BastionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unauthorized(code: &'static str, reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            code,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type BastionResult<T> = Result<T, BastionError>;

/// Reject an empty or whitespace-only required argument.
pub fn require_non_empty(field: &str, value: &str) -> BastionResult<()> {
    if value.trim().is_empty() {
        return Err(BastionError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}
