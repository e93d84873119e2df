//! Bastion Core: shared domain models, error types, and repository
//! traits.

pub mod error;
pub mod models;
pub mod principal;
pub mod repository;
