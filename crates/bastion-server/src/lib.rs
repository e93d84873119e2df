//! Bastion Server: layered configuration, bootstrap seeding, service
//! wiring and the background jobs the binary runs.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod jobs;
pub mod state;

pub use config::ServerConfig;
pub use error::ServerError;
pub use state::AppState;
