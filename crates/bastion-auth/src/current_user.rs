//! Resolution of the user behind a request from its credential.

use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::user::User;
use bastion_core::principal::{CurrentUserProvider, Principal};
use bastion_core::repository::UserRepository;
use http::HeaderMap;
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::credential::CredentialStore;
use crate::token;

/// Per-request view over the inbound headers that turns the credential
/// into a [`Principal`] and, on demand, the stored [`User`].
pub struct CurrentUserResolver<'a, U: UserRepository> {
    users: &'a U,
    config: &'a AuthConfig,
    credentials: CredentialStore,
    headers: &'a HeaderMap,
}

impl<'a, U: UserRepository> CurrentUserResolver<'a, U> {
    pub fn new(users: &'a U, config: &'a AuthConfig, headers: &'a HeaderMap) -> Self {
        Self {
            users,
            config,
            credentials: CredentialStore::from_config(config),
            headers,
        }
    }

    /// Validate the request credential and return its principal.
    pub fn principal(&self) -> BastionResult<Principal> {
        let raw = self.credentials.get(self.headers)?;
        Ok(token::validate_token(&raw, self.config)?)
    }

    pub fn current_user_id(&self) -> BastionResult<Uuid> {
        Ok(self.principal()?.user_id)
    }

    /// Load the stored user for the request credential.
    pub async fn current_user(&self) -> BastionResult<User> {
        let principal = self.principal()?;
        self.users
            .get_by_id(principal.tenant_id, principal.user_id)
            .await
    }
}

impl<U: UserRepository> CurrentUserProvider for CurrentUserResolver<'_, U> {
    async fn current_user(&self) -> BastionResult<Option<User>> {
        match CurrentUserResolver::current_user(self).await {
            Ok(user) => Ok(Some(user)),
            Err(BastionError::Unauthorized { code, .. }) => {
                debug!(code, "no usable credential");
                Ok(None)
            }
            Err(BastionError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
