//! Permission domain models: records, actions, role action rows and
//! per-user overrides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named capability grantable to roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Human-readable name (e.g., `Manage articles`).
    pub name: String,
    /// Unique machine name used by authorization checks (e.g., `Articles`).
    pub system_name: String,
    /// Grouping label for admin screens.
    pub category: String,
    /// Roles currently granted this permission.
    pub granted_role_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PermissionRecord {
    pub fn is_granted_to(&self, role_id: Uuid) -> bool {
        self.granted_role_ids.contains(&role_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermissionRecord {
    pub tenant_id: Uuid,
    pub name: String,
    pub system_name: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePermissionRecord {
    pub name: Option<String>,
    pub system_name: Option<String>,
    pub category: Option<String>,
}

/// A specific operation (`List`, `Create`, `Publish`, ...) scoped to a
/// permission record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionAction {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub permission_record_id: Uuid,
    pub name: String,
    pub system_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermissionAction {
    pub tenant_id: Uuid,
    pub permission_record_id: Uuid,
    pub name: String,
    pub system_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePermissionAction {
    pub name: Option<String>,
    pub system_name: Option<String>,
}

/// Associates a role with a permission action.
///
/// The authorization engine reads the presence of a row as a revocation
/// of that action for the role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermissionAction {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub role_id: Uuid,
    /// `None` once the referenced action has been deleted.
    pub permission_action_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRolePermissionAction {
    pub tenant_id: Uuid,
    pub role_id: Uuid,
    pub permission_action_id: Uuid,
}

/// Explicit allow/deny of a permission action for a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPermissionAction {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    /// `None` once the referenced action has been deleted.
    pub permission_action_id: Option<Uuid>,
    pub is_allowed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUserPermissionAction {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub permission_action_id: Uuid,
    pub is_allowed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granted_role_membership() {
        let role = Uuid::new_v4();
        let record = PermissionRecord {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Manage articles".into(),
            system_name: "Articles".into(),
            category: "Content".into(),
            granted_role_ids: vec![role],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(record.is_granted_to(role));
        assert!(!record.is_granted_to(Uuid::new_v4()));
    }
}
