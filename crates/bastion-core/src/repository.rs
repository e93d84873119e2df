//! Storage seams. Everything below the tenant takes a `tenant_id`, and no
//! query may cross it. Lookups on the authorization path return `Option`:
//! a missing row means "deny", not an error.

use uuid::Uuid;

use crate::error::BastionResult;
use crate::models::{
    permission::{
        CreatePermissionAction, CreatePermissionRecord, CreateRolePermissionAction,
        PermissionAction, PermissionRecord, RolePermissionAction, SetUserPermissionAction,
        UpdatePermissionAction, UpdatePermissionRecord, UserPermissionAction,
    },
    refresh_token::{RefreshToken, UpsertRefreshToken},
    role::{CreateRole, Role, UpdateRole},
    tenant::{CreateTenant, Tenant, UpdateTenant},
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> PaginatedResult<T> {
    /// Wrap one page of `items` fetched with `pagination`.
    pub fn new(items: Vec<T>, total: u64, pagination: &Pagination) -> Self {
        Self {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Tenants (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = BastionResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = BastionResult<Tenant>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = BastionResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = BastionResult<Tenant>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = BastionResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = BastionResult<PaginatedResult<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Users and roles
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = BastionResult<User>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = BastionResult<User>> + Send;
    fn get_by_username(
        &self,
        tenant_id: Uuid,
        username: &str,
    ) -> impl Future<Output = BastionResult<User>> + Send;
    fn get_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> impl Future<Output = BastionResult<User>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = BastionResult<User>> + Send;
    /// Soft-delete: sets status to Inactive.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = BastionResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = BastionResult<PaginatedResult<User>>> + Send;
}

pub trait RoleRepository: Send + Sync {
    fn create(&self, input: CreateRole) -> impl Future<Output = BastionResult<Role>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = BastionResult<Role>> + Send;
    fn get_by_name(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> impl Future<Output = BastionResult<Option<Role>>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateRole,
    ) -> impl Future<Output = BastionResult<Role>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = BastionResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = BastionResult<PaginatedResult<Role>>> + Send;

    /// Assign a role to a user (creates a `has_role` edge).
    fn assign_to_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = BastionResult<()>> + Send;

    /// Remove a role assignment from a user.
    fn unassign_from_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = BastionResult<()>> + Send;

    /// Get all roles assigned to a user, active or not.
    fn get_user_roles(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = BastionResult<Vec<Role>>> + Send;
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Permission records, their role grants, and their actions.
pub trait PermissionRepository: Send + Sync {
    fn create(
        &self,
        input: CreatePermissionRecord,
    ) -> impl Future<Output = BastionResult<PermissionRecord>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = BastionResult<PermissionRecord>> + Send;
    /// Look up a record (with its granted role ids) by system name.
    fn find_by_system_name(
        &self,
        tenant_id: Uuid,
        system_name: &str,
    ) -> impl Future<Output = BastionResult<Option<PermissionRecord>>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePermissionRecord,
    ) -> impl Future<Output = BastionResult<PermissionRecord>> + Send;
    /// Delete a record, its grants, and its actions in one transaction.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = BastionResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = BastionResult<PaginatedResult<PermissionRecord>>> + Send;
    fn list_by_category(
        &self,
        tenant_id: Uuid,
        category: &str,
    ) -> impl Future<Output = BastionResult<Vec<PermissionRecord>>> + Send;

    /// Grant a permission record to a role (creates a `grants` edge).
    fn grant_to_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> impl Future<Output = BastionResult<()>> + Send;

    /// Revoke a permission record from a role.
    fn revoke_from_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> impl Future<Output = BastionResult<()>> + Send;

    /// Get all permission records granted to a role.
    fn get_role_permissions(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = BastionResult<Vec<PermissionRecord>>> + Send;

    fn create_action(
        &self,
        input: CreatePermissionAction,
    ) -> impl Future<Output = BastionResult<PermissionAction>> + Send;
    fn get_action(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = BastionResult<PermissionAction>> + Send;
    fn update_action(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePermissionAction,
    ) -> impl Future<Output = BastionResult<PermissionAction>> + Send;
    /// Delete an action; dependent role rows and user overrides keep
    /// existing with a null action reference.
    fn delete_action(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = BastionResult<()>> + Send;
    fn list_actions(
        &self,
        tenant_id: Uuid,
        permission_record_id: Uuid,
    ) -> impl Future<Output = BastionResult<Vec<PermissionAction>>> + Send;
}

pub trait RolePermissionActionRepository: Send + Sync {
    fn create(
        &self,
        input: CreateRolePermissionAction,
    ) -> impl Future<Output = BastionResult<RolePermissionAction>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = BastionResult<()>> + Send;
    /// Find the row linking `role_id` to the action named `action_name`
    /// under the permission record `permission_system_name`.
    fn find(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_system_name: &str,
        action_name: &str,
    ) -> impl Future<Output = BastionResult<Option<RolePermissionAction>>> + Send;
    fn list_by_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = BastionResult<Vec<RolePermissionAction>>> + Send;
}

pub trait UserPermissionActionRepository: Send + Sync {
    /// Create the override, or overwrite `is_allowed` on the existing one.
    fn set(
        &self,
        input: SetUserPermissionAction,
    ) -> impl Future<Output = BastionResult<UserPermissionAction>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = BastionResult<()>> + Send;
    fn find(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        permission_system_name: &str,
        action_name: &str,
    ) -> impl Future<Output = BastionResult<Option<UserPermissionAction>>> + Send;
    fn list_by_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = BastionResult<Vec<UserPermissionAction>>> + Send;
}

// ---------------------------------------------------------------------------
// Refresh tokens
// ---------------------------------------------------------------------------

pub trait RefreshTokenRepository: Send + Sync {
    fn get_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = BastionResult<Option<RefreshToken>>> + Send;
    /// Persist a newly issued token as the user's single live record:
    /// insert, update in place, or replace an expired record, all inside
    /// one transaction.
    fn upsert_active_for_user(
        &self,
        input: UpsertRefreshToken,
    ) -> impl Future<Output = BastionResult<RefreshToken>> + Send;
    fn delete_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = BastionResult<()>> + Send;
    /// Remove all expired records; returns how many were removed.
    fn cleanup_expired(&self, tenant_id: Uuid) -> impl Future<Output = BastionResult<u64>> + Send;
}
