//! HS256 JWT issuance and validation, and token hashing for refresh
//! records.

use bastion_core::models::user::User;
use bastion_core::principal::Principal;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Separator of the `role` claim.
pub const ROLE_SEPARATOR: &str = ";";

/// JWT claims embedded in every access token.
///
/// Tokens from [`issue_simple_token`] carry only the identity, email and
/// role claims; the other optional claims then decode as empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: user ID (UUID string).
    pub sub: String,
    /// Tenant ID (UUID string).
    pub tenant_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub avatar: String,
    /// Role names joined with `;`.
    pub role: String,
    /// Scopes joined with spaces.
    #[serde(default)]
    pub scope: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn roles(&self) -> Vec<String> {
        self.role
            .split(ROLE_SEPARATOR)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(String::from).collect()
    }

    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|e| AuthError::TokenInvalid(format!("bad subject: {e}")))
    }

    pub fn into_principal(self) -> Result<Principal, AuthError> {
        let user_id = self.user_id()?;
        let tenant_id = Uuid::parse_str(&self.tenant_id)
            .map_err(|e| AuthError::TokenInvalid(format!("bad tenant: {e}")))?;
        let roles = self.roles();
        let scopes = self.scopes();
        Ok(Principal {
            user_id,
            tenant_id,
            username: self.username,
            email: self.email,
            display_name: self.name,
            roles,
            scopes,
        })
    }
}

/// A signed token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn encoding_key(config: &AuthConfig) -> Result<EncodingKey, AuthError> {
    if config.jwt_secret.is_empty() {
        return Err(AuthError::Crypto("JWT secret is not configured".into()));
    }
    Ok(EncodingKey::from_secret(config.jwt_secret.as_bytes()))
}

fn role_claim(roles: &[String], config: &AuthConfig) -> String {
    if roles.is_empty() {
        config.default_role.clone()
    } else {
        roles.join(ROLE_SEPARATOR)
    }
}

fn sign(claims: &AccessTokenClaims, config: &AuthConfig) -> Result<String, AuthError> {
    let key = encoding_key(config)?;
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Issue a signed access token carrying the user's identity, roles and
/// scopes. Expires `token_lifetime_days` from now.
pub fn issue_token(
    user: &User,
    roles: &[String],
    scopes: &[String],
    config: &AuthConfig,
) -> Result<IssuedToken, AuthError> {
    let now = Utc::now();
    let expires_at = now + Duration::days(config.token_lifetime_days);
    let claims = AccessTokenClaims {
        sub: user.id.to_string(),
        tenant_id: user.tenant_id.to_string(),
        name: user.display_name.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        avatar: user
            .avatar
            .clone()
            .unwrap_or_else(|| config.default_avatar.clone()),
        role: role_claim(roles, config),
        scope: scopes.join(" "),
        iss: config.jwt_issuer.clone(),
        aud: config.jwt_audience.clone(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    Ok(IssuedToken {
        token: sign(&claims, config)?,
        expires_at,
    })
}

/// Issue a minimal token (identity, tenant, email, role) that expires
/// `simple_token_lifetime_days` from now.
pub fn issue_simple_token(
    user: &User,
    roles: &[String],
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = AccessTokenClaims {
        sub: user.id.to_string(),
        tenant_id: user.tenant_id.to_string(),
        name: String::new(),
        username: String::new(),
        email: user.email.clone(),
        avatar: String::new(),
        role: role_claim(roles, config),
        scope: String::new(),
        iss: config.jwt_issuer.clone(),
        aud: config.jwt_audience.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::days(config.simple_token_lifetime_days)).timestamp(),
        jti: Uuid::new_v4().to_string(),
    };
    sign(&claims, config)
}

/// Decode a token, checking signature, issuer and audience. Expiry is
/// only enforced when `validate_lifetime` is set.
pub fn decode_token(token: &str, config: &AuthConfig) -> Result<AccessTokenClaims, AuthError> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.jwt_issuer]);
    validation.set_audience(&[&config.jwt_audience]);
    validation.set_required_spec_claims(&["sub", "exp", "iss", "aud"]);
    validation.validate_exp = config.validate_lifetime;

    jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })
}

/// Validate a token and build the request principal from its claims.
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<Principal, AuthError> {
    decode_token(token, config)?.into_principal()
}

/// SHA-256 hash of a signed token, hex-encoded. This is the value kept in
/// the refresh record.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
