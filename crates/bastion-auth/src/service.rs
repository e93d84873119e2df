//! Token issuance with refresh-record bookkeeping, and the login, refresh
//! and logout flows built on it.

use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::refresh_token::UpsertRefreshToken;
use bastion_core::models::user::{User, UserStatus};
use bastion_core::principal::Principal;
use bastion_core::repository::{RefreshTokenRepository, RoleRepository, UserRepository};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token;

/// A freshly issued access token.
#[derive(Debug, Clone)]
pub struct TokenResult {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Issues signed tokens and keeps each user's single refresh record in
/// step with the latest one.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct TokenService<R: RoleRepository, T: RefreshTokenRepository> {
    role_repo: R,
    refresh_repo: T,
    config: AuthConfig,
}

impl<R: RoleRepository, T: RefreshTokenRepository> TokenService<R, T> {
    pub fn new(role_repo: R, refresh_repo: T, config: AuthConfig) -> Self {
        Self {
            role_repo,
            refresh_repo,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    async fn role_names(&self, user: &User) -> BastionResult<Vec<String>> {
        let roles = self
            .role_repo
            .get_user_roles(user.tenant_id, user.id)
            .await?;
        Ok(roles
            .into_iter()
            .filter(|r| r.is_active)
            .map(|r| r.name)
            .collect())
    }

    /// Sign an access token for `user` and upsert their refresh record
    /// with its hash.
    #[instrument(skip(self, user), fields(user_id = %user.id, tenant_id = %user.tenant_id))]
    pub async fn generate_token(&self, user: &User, scopes: &[String]) -> BastionResult<TokenResult> {
        let roles = self.role_names(user).await?;
        let issued = token::issue_token(user, &roles, scopes, &self.config)?;

        self.refresh_repo
            .upsert_active_for_user(UpsertRefreshToken {
                tenant_id: user.tenant_id,
                user_id: user.id,
                token_hash: token::hash_token(&issued.token),
                expires_at: Utc::now() + Duration::days(self.config.refresh_token_lifetime_days),
            })
            .await?;

        info!(expires_at = %issued.expires_at, "access token issued");
        Ok(TokenResult {
            token: issued.token,
            user_id: user.id,
            expires_at: issued.expires_at,
        })
    }

    /// Sign a minimal one-day token. No refresh record is written.
    pub async fn generate_simple_token(&self, user: &User) -> BastionResult<String> {
        let roles = self.role_names(user).await?;
        Ok(token::issue_simple_token(user, &roles, &self.config)?)
    }

    pub fn validate_token(&self, token: &str) -> BastionResult<Principal> {
        Ok(token::validate_token(token, &self.config)?)
    }
}

/// Authentication service: credential checks in front of the
/// [`TokenService`].
pub struct AuthService<U, R, T>
where
    U: UserRepository,
    R: RoleRepository,
    T: RefreshTokenRepository,
{
    user_repo: U,
    refresh_repo: T,
    tokens: TokenService<R, T>,
}

impl<U, R, T> AuthService<U, R, T>
where
    U: UserRepository,
    R: RoleRepository,
    T: RefreshTokenRepository + Clone,
{
    pub fn new(user_repo: U, role_repo: R, refresh_repo: T, config: AuthConfig) -> Self {
        Self {
            user_repo,
            tokens: TokenService::new(role_repo, refresh_repo.clone(), config),
            refresh_repo,
        }
    }

    pub fn tokens(&self) -> &TokenService<R, T> {
        &self.tokens
    }

    fn ensure_active(user: &User) -> Result<(), AuthError> {
        match user.status {
            UserStatus::Active => Ok(()),
            UserStatus::Locked => Err(AuthError::AccountLocked),
            UserStatus::Inactive => Err(AuthError::AccountInactive),
            UserStatus::PendingVerification => Err(AuthError::AccountPendingVerification),
        }
    }

    /// Authenticate a user with username/email + password and issue a
    /// token.
    #[instrument(skip(self, password, scopes))]
    pub async fn login(
        &self,
        tenant_id: Uuid,
        username_or_email: &str,
        password: &str,
        scopes: &[String],
    ) -> BastionResult<TokenResult> {
        // Username first, then email.
        let user = match self
            .user_repo
            .get_by_username(tenant_id, username_or_email)
            .await
        {
            Ok(u) => u,
            Err(BastionError::NotFound { .. }) => self
                .user_repo
                .get_by_email(tenant_id, username_or_email)
                .await
                .map_err(|e| match e {
                    BastionError::NotFound { .. } => AuthError::InvalidCredentials.into(),
                    other => other,
                })?,
            Err(e) => return Err(e),
        };

        let valid = password::verify_password(
            password,
            &user.password_hash,
            self.tokens.config().pepper.as_deref(),
        )?;
        if !valid {
            warn!(user_id = %user.id, "login rejected: bad password");
            return Err(AuthError::InvalidCredentials.into());
        }

        Self::ensure_active(&user)?;

        self.tokens.generate_token(&user, scopes).await
    }

    /// Reissue a token for the holder of `token`, provided it is the
    /// latest token recorded for that user and the record has not
    /// expired.
    #[instrument(skip(self, token, scopes))]
    pub async fn refresh(&self, token: &str, scopes: &[String]) -> BastionResult<TokenResult> {
        let principal = self.tokens.validate_token(token)?;

        let record = self
            .refresh_repo
            .get_for_user(principal.tenant_id, principal.user_id)
            .await?
            .ok_or(AuthError::RefreshRejected)?;

        if record.token_hash != token::hash_token(token) || record.is_expired_at(Utc::now()) {
            warn!(user_id = %principal.user_id, "refresh rejected");
            return Err(AuthError::RefreshRejected.into());
        }

        let user = self
            .user_repo
            .get_by_id(principal.tenant_id, principal.user_id)
            .await
            .map_err(|e| match e {
                BastionError::NotFound { .. } => AuthError::RefreshRejected.into(),
                other => other,
            })?;
        Self::ensure_active(&user)?;

        self.tokens.generate_token(&user, scopes).await
    }

    /// Drop the user's refresh record; outstanding tokens can no longer
    /// be refreshed.
    #[instrument(skip(self))]
    pub async fn logout(&self, tenant_id: Uuid, user_id: Uuid) -> BastionResult<()> {
        self.refresh_repo.delete_for_user(tenant_id, user_id).await?;
        info!("refresh record removed");
        Ok(())
    }
}
