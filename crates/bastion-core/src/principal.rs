//! The per-request principal and the seam through which services resolve
//! the current user.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BastionResult;
use crate::models::user::User;

/// Identity resolved from a validated access token. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<String>,
    pub scopes: Vec<String>,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Resolves the user behind the current request.
///
/// Returns `Ok(None)` when the request carries no usable credential, so
/// authorization checks can fail closed instead of erroring.
pub trait CurrentUserProvider: Send + Sync {
    fn current_user(&self) -> impl Future<Output = BastionResult<Option<User>>> + Send;
}
