//! Authorization configuration.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// How long a cached decision may outlive the data it was derived
    /// from (default: 3600).
    pub permission_cache_ttl_secs: u64,
}

impl AuthorizationConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.permission_cache_ttl_secs)
    }
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            permission_cache_ttl_secs: 3600,
        }
    }
}
