//! Bastion Authz: decides whether a user may use a permission or one of
//! its actions, caching every decision under the `permissions.` prefix.

pub mod cache_keys;
pub mod config;
pub mod error;
pub mod service;

pub use config::AuthorizationConfig;
pub use error::AuthzError;
pub use service::PermissionService;
