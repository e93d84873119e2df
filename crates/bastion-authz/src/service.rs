//! The permission authorization engine and the administrative mutations
//! that keep its cache honest.
//!
//! Decisions are cache-first. On a miss the engine asks the repositories
//! and caches the answer for the configured TTL. Every mutation flushes
//! all keys under [`PERMISSIONS_PREFIX`] once the write has succeeded, so
//! other requests see the change on their next miss.
//!
//! Role action rows act as revocations: a row for (role, permission,
//! action) denies that action to the role even when the role holds the
//! permission itself.

use std::time::Duration;

use bastion_cache::CacheStore;
use bastion_core::error::{BastionError, BastionResult, require_non_empty};
use bastion_core::models::permission::{
    CreatePermissionAction, CreatePermissionRecord, CreateRolePermissionAction,
    PermissionAction, PermissionRecord, RolePermissionAction, SetUserPermissionAction,
    UpdatePermissionAction, UpdatePermissionRecord, UserPermissionAction,
};
use bastion_core::models::role::Role;
use bastion_core::models::user::User;
use bastion_core::principal::CurrentUserProvider;
use bastion_core::repository::{
    PermissionRepository, RolePermissionActionRepository, RoleRepository,
    UserPermissionActionRepository,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cache_keys::{self, PERMISSIONS_PREFIX};
use crate::config::AuthorizationConfig;
use crate::error::AuthzError;

fn require_id(field: &str, id: Uuid) -> BastionResult<()> {
    if id.is_nil() {
        return Err(BastionError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_if_set(field: &str, value: Option<&String>) -> BastionResult<()> {
    value.map_or(Ok(()), |v| require_non_empty(field, v))
}

/// Authorization decisions over permission records, role action rows and
/// user overrides.
///
/// Generic over repository implementations so that the engine has no
/// dependency on the database crate.
pub struct PermissionService<P, G, O, R>
where
    P: PermissionRepository,
    G: RolePermissionActionRepository,
    O: UserPermissionActionRepository,
    R: RoleRepository,
{
    permissions: P,
    role_actions: G,
    user_actions: O,
    roles: R,
    cache: CacheStore,
    ttl: Duration,
}

impl<P, G, O, R> PermissionService<P, G, O, R>
where
    P: PermissionRepository,
    G: RolePermissionActionRepository,
    O: UserPermissionActionRepository,
    R: RoleRepository,
{
    pub fn new(
        permissions: P,
        role_actions: G,
        user_actions: O,
        roles: R,
        cache: CacheStore,
        config: &AuthorizationConfig,
    ) -> Self {
        Self {
            permissions,
            role_actions,
            user_actions,
            roles,
            cache,
            ttl: config.cache_ttl(),
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    async fn active_roles(&self, user: &User) -> BastionResult<Vec<Role>> {
        let roles = self.roles.get_user_roles(user.tenant_id, user.id).await?;
        Ok(roles.into_iter().filter(|r| r.is_active).collect())
    }

    // -----------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------

    /// Whether the current user holds `system_name` through any active
    /// role. No user means no.
    pub async fn authorize<C: CurrentUserProvider>(
        &self,
        system_name: &str,
        current: &C,
    ) -> BastionResult<bool> {
        if system_name.trim().is_empty() {
            return Ok(false);
        }
        let Some(user) = current.current_user().await? else {
            debug!(system_name, "no current user; denied");
            return Ok(false);
        };
        self.authorize_user(system_name, &user).await
    }

    /// Whether `user` holds `system_name` through any active role.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn authorize_user(&self, system_name: &str, user: &User) -> BastionResult<bool> {
        if system_name.trim().is_empty() {
            return Ok(false);
        }
        for role in self.active_roles(user).await? {
            if self.authorize_role(system_name, &role).await? {
                return Ok(true);
            }
        }
        debug!("no role grants the permission");
        Ok(false)
    }

    /// Whether `role` has been granted `system_name`.
    pub async fn authorize_role(&self, system_name: &str, role: &Role) -> BastionResult<bool> {
        if system_name.trim().is_empty() {
            return Ok(false);
        }
        let key = cache_keys::role_allowed(role.id, system_name);
        let permissions = &self.permissions;
        let granted = self
            .cache
            .get_or_create(&key, self.ttl, move || async move {
                let record = permissions
                    .find_by_system_name(role.tenant_id, system_name)
                    .await?;
                Ok::<_, AuthzError>(record.is_some_and(|r| r.is_granted_to(role.id)))
            })
            .await?;
        Ok(granted)
    }

    /// Whether the current user may perform `action_name` under
    /// `system_name`.
    pub async fn authorize_action<C: CurrentUserProvider>(
        &self,
        system_name: &str,
        action_name: &str,
        current: &C,
    ) -> BastionResult<bool> {
        if system_name.trim().is_empty() || action_name.trim().is_empty() {
            return Ok(false);
        }
        let Some(user) = current.current_user().await? else {
            return Ok(false);
        };
        self.authorize_action_for(system_name, action_name, &user)
            .await
    }

    /// Whether `user` may perform `action_name` under `system_name`: the
    /// permission must be granted and no active role may carry a
    /// revocation row for the action.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn authorize_action_for(
        &self,
        system_name: &str,
        action_name: &str,
        user: &User,
    ) -> BastionResult<bool> {
        if action_name.trim().is_empty() || !self.authorize_user(system_name, user).await? {
            return Ok(false);
        }

        let role_actions = &self.role_actions;
        for role in self.active_roles(user).await? {
            let key = cache_keys::role_action(role.id, system_name, action_name);
            let (tenant_id, role_id) = (role.tenant_id, role.id);
            let revoked = self
                .cache
                .get_or_create(&key, self.ttl, move || async move {
                    let row = role_actions
                        .find(tenant_id, role_id, system_name, action_name)
                        .await?;
                    Ok::<_, AuthzError>(row.is_some())
                })
                .await?;
            if revoked {
                debug!(role = %role.name, "action revoked for role");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Like [`Self::authorize_action`], but an explicit override on the
    /// current user decides first.
    pub async fn authorize_user_action<C: CurrentUserProvider>(
        &self,
        system_name: &str,
        action_name: &str,
        current: &C,
    ) -> BastionResult<bool> {
        if system_name.trim().is_empty() || action_name.trim().is_empty() {
            return Ok(false);
        }
        let Some(user) = current.current_user().await? else {
            return Ok(false);
        };
        self.authorize_user_action_for(system_name, action_name, &user)
            .await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn authorize_user_action_for(
        &self,
        system_name: &str,
        action_name: &str,
        user: &User,
    ) -> BastionResult<bool> {
        if system_name.trim().is_empty() || action_name.trim().is_empty() {
            return Ok(false);
        }
        let key = cache_keys::user_action(user.id, system_name, action_name);
        let user_actions = &self.user_actions;
        let decision: Option<bool> = self
            .cache
            .get_or_create(&key, self.ttl, move || async move {
                let row = user_actions
                    .find(user.tenant_id, user.id, system_name, action_name)
                    .await?;
                Ok::<_, AuthzError>(row.map(|o| o.is_allowed))
            })
            .await?;

        match decision {
            Some(allowed) => {
                debug!(allowed, "user override applied");
                Ok(allowed)
            }
            None => {
                self.authorize_action_for(system_name, action_name, user)
                    .await
            }
        }
    }

    // -----------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------

    async fn invalidate(&self) {
        let removed = self.cache.remove_by_prefix(PERMISSIONS_PREFIX).await;
        info!(removed, "permission cache flushed");
    }

    #[instrument(skip(self, input), fields(system_name = %input.system_name))]
    pub async fn create_record(
        &self,
        input: CreatePermissionRecord,
    ) -> BastionResult<PermissionRecord> {
        require_id("tenant_id", input.tenant_id)?;
        require_non_empty("name", &input.name)?;
        require_non_empty("system_name", &input.system_name)?;
        let record = self.permissions.create(input).await?;
        self.invalidate().await;
        Ok(record)
    }

    #[instrument(skip(self, input))]
    pub async fn update_record(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePermissionRecord,
    ) -> BastionResult<PermissionRecord> {
        require_id("id", id)?;
        require_if_set("name", input.name.as_ref())?;
        require_if_set("system_name", input.system_name.as_ref())?;
        let record = self.permissions.update(tenant_id, id, input).await?;
        self.invalidate().await;
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn delete_record(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        require_id("id", id)?;
        self.permissions.delete(tenant_id, id).await?;
        self.invalidate().await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn grant_to_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> BastionResult<()> {
        require_id("role_id", role_id)?;
        require_id("permission_id", permission_id)?;
        self.permissions
            .grant_to_role(tenant_id, role_id, permission_id)
            .await?;
        self.invalidate().await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn revoke_from_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> BastionResult<()> {
        require_id("role_id", role_id)?;
        require_id("permission_id", permission_id)?;
        self.permissions
            .revoke_from_role(tenant_id, role_id, permission_id)
            .await?;
        self.invalidate().await;
        Ok(())
    }

    #[instrument(skip(self, input), fields(action = %input.name))]
    pub async fn create_action(
        &self,
        input: CreatePermissionAction,
    ) -> BastionResult<PermissionAction> {
        require_id("permission_record_id", input.permission_record_id)?;
        require_non_empty("name", &input.name)?;
        require_non_empty("system_name", &input.system_name)?;
        let action = self.permissions.create_action(input).await?;
        self.invalidate().await;
        Ok(action)
    }

    #[instrument(skip(self, input))]
    pub async fn update_action(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePermissionAction,
    ) -> BastionResult<PermissionAction> {
        require_id("id", id)?;
        require_if_set("name", input.name.as_ref())?;
        require_if_set("system_name", input.system_name.as_ref())?;
        let action = self.permissions.update_action(tenant_id, id, input).await?;
        self.invalidate().await;
        Ok(action)
    }

    #[instrument(skip(self))]
    pub async fn delete_action(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        require_id("id", id)?;
        self.permissions.delete_action(tenant_id, id).await?;
        self.invalidate().await;
        Ok(())
    }

    #[instrument(skip(self, input), fields(role_id = %input.role_id))]
    pub async fn add_role_action(
        &self,
        input: CreateRolePermissionAction,
    ) -> BastionResult<RolePermissionAction> {
        require_id("role_id", input.role_id)?;
        require_id("permission_action_id", input.permission_action_id)?;
        let row = self.role_actions.create(input).await?;
        self.invalidate().await;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn remove_role_action(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        require_id("id", id)?;
        self.role_actions.delete(tenant_id, id).await?;
        self.invalidate().await;
        Ok(())
    }

    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn set_user_action(
        &self,
        input: SetUserPermissionAction,
    ) -> BastionResult<UserPermissionAction> {
        require_id("user_id", input.user_id)?;
        require_id("permission_action_id", input.permission_action_id)?;
        let row = self.user_actions.set(input).await?;
        self.invalidate().await;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn remove_user_action(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        require_id("id", id)?;
        self.user_actions.delete(tenant_id, id).await?;
        self.invalidate().await;
        Ok(())
    }
}
