//! Server startup errors.

use std::path::PathBuf;

use bastion_core::error::BastionError;
use bastion_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value}")]
    ConfigEnv { var: String, value: String },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Bastion(#[from] BastionError),

    #[error("failed to initialize tracing: {0}")]
    Tracing(String),
}
