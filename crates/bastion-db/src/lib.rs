//! Bastion Database: SurrealDB connection management, migrations,
//! transactions and repository implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - A commit-or-rollback transaction wrapper ([`run_in_transaction`])
//! - SurrealDB implementations of the `bastion-core` repository traits
//! - Error types ([`DbError`])

mod connection;
mod error;
pub mod repository;
mod schema;
mod transaction;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::run_migrations;
pub use transaction::{Transaction, lost_write_race, run_in_transaction};
