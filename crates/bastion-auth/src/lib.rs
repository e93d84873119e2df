//! Bastion Auth: password verification, JWT issuance/validation,
//! single-record refresh tokens, and request credential resolution.

pub mod config;
pub mod credential;
pub mod current_user;
pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use credential::CredentialStore;
pub use current_user::CurrentUserResolver;
pub use error::AuthError;
pub use service::{AuthService, TokenResult, TokenService};
pub use token::AccessTokenClaims;
