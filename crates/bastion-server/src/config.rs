//! Layered server configuration: built-in defaults, then an optional TOML
//! file, then `BASTION_*` environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use bastion_auth::AuthConfig;
use bastion_authz::AuthorizationConfig;
use bastion_cache::CacheConfig;
use bastion_db::DbConfig;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ServerError;

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "BASTION_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "bastion.toml";

/// A permission record created at startup and granted to the
/// administrator role.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PermissionSeed {
    pub name: String,
    pub system_name: String,
    #[serde(default)]
    pub category: String,
}

impl PermissionSeed {
    fn new(name: &str, system_name: &str, category: &str) -> Self {
        Self {
            name: name.into(),
            system_name: system_name.into(),
            category: category.into(),
        }
    }
}

/// What the server seeds on every start. Seeding is idempotent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub tenant_name: String,
    pub tenant_slug: String,
    pub admin_role: String,
    pub permissions: Vec<PermissionSeed>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            tenant_name: "Default".into(),
            tenant_slug: "default".into(),
            admin_role: "Administrator".into(),
            permissions: vec![
                PermissionSeed::new("Manage users", "Users", "Security"),
                PermissionSeed::new("Manage roles", "Roles", "Security"),
                PermissionSeed::new("Manage permissions", "Permissions", "Security"),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Interval between expired refresh record sweeps (default: 3600).
    /// Zero disables the sweep.
    pub refresh_cleanup_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            refresh_cleanup_interval_secs: 3600,
        }
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub database: DbConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub authorization: AuthorizationConfig,
    pub bootstrap: BootstrapConfig,
    pub jobs: JobsConfig,
}

fn parse_env<T: FromStr>(var: &str, value: String) -> Result<T, ServerError> {
    value
        .parse()
        .map_err(|_| ServerError::ConfigEnv {
            var: var.to_string(),
            value,
        })
}

impl ServerConfig {
    /// Load from the process environment and the file it points at.
    pub fn load() -> Result<Self, ServerError> {
        let explicit = std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else if explicit.is_some() {
            return Err(ServerError::ConfigRead {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
                path,
            });
        } else {
            debug!(path = %path.display(), "no config file; using defaults");
            Self::default()
        };

        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ServerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|source| ServerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Overlay `BASTION_*` variables resolved through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |var: &str, target: &mut String| {
            if let Some(value) = lookup(var) {
                *target = value;
            }
        };
        text("BASTION_DB_URL", &mut self.database.url);
        text("BASTION_DB_NAMESPACE", &mut self.database.namespace);
        text("BASTION_DB_DATABASE", &mut self.database.database);
        text("BASTION_DB_USERNAME", &mut self.database.username);
        text("BASTION_DB_PASSWORD", &mut self.database.password);
        text("BASTION_JWT_SECRET", &mut self.auth.jwt_secret);
        text("BASTION_JWT_ISSUER", &mut self.auth.jwt_issuer);
        text("BASTION_JWT_AUDIENCE", &mut self.auth.jwt_audience);
        text("BASTION_COOKIE_NAME", &mut self.auth.cookie_name);

        if let Some(pepper) = lookup("BASTION_PASSWORD_PEPPER") {
            self.auth.pepper = (!pepper.is_empty()).then_some(pepper);
        }
        if let Some(v) = lookup("BASTION_TOKEN_LIFETIME_DAYS") {
            self.auth.token_lifetime_days = parse_env("BASTION_TOKEN_LIFETIME_DAYS", v)?;
        }
        if let Some(v) = lookup("BASTION_VALIDATE_LIFETIME") {
            self.auth.validate_lifetime = parse_env("BASTION_VALIDATE_LIFETIME", v)?;
        }
        if let Some(v) = lookup("BASTION_CACHE_MAX_CAPACITY") {
            self.cache.max_capacity = parse_env("BASTION_CACHE_MAX_CAPACITY", v)?;
        }
        if let Some(v) = lookup("BASTION_PERMISSION_CACHE_TTL_SECS") {
            self.authorization.permission_cache_ttl_secs =
                parse_env("BASTION_PERMISSION_CACHE_TTL_SECS", v)?;
        }
        Ok(())
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ServerError::ConfigInvalid(
                "auth.jwt_secret must be set (or BASTION_JWT_SECRET)".into(),
            ));
        }
        if self.bootstrap.tenant_slug.trim().is_empty() {
            return Err(ServerError::ConfigInvalid(
                "bootstrap.tenant_slug must not be empty".into(),
            ));
        }
        Ok(())
    }
}
