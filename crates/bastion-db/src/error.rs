//! Database-specific error types and conversions.

use bastion_core::error::BastionError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Malformed row: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    AlreadyExists { entity: String },
}

impl From<DbError> for BastionError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => BastionError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => BastionError::AlreadyExists { entity },
            other => BastionError::Database(other.to_string()),
        }
    }
}

/// Map a failed statement to a domain error. Unique index violations
/// become [`DbError::AlreadyExists`].
pub(crate) fn statement_error(entity: &str, err: surrealdb::Error) -> DbError {
    let message = err.to_string();
    if message.contains("already contains") {
        DbError::AlreadyExists {
            entity: entity.to_string(),
        }
    } else {
        DbError::Query(message)
    }
}

/// Parse a UUID stored as a string column.
pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}

/// Parse a nullable UUID column.
pub(crate) fn parse_opt_uuid(
    field: &str,
    raw: Option<&str>,
) -> Result<Option<uuid::Uuid>, DbError> {
    raw.map(|r| parse_uuid(field, r)).transpose()
}
