//! Role action rows. A row revokes one action for one role.

use bastion_core::error::BastionResult;
use bastion_core::models::permission::{CreateRolePermissionAction, RolePermissionAction};
use bastion_core::repository::RolePermissionActionRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::ensure_exists;
use crate::error::{DbError, parse_opt_uuid, parse_uuid, statement_error};

/// Resolves the action ids named `$action_name` under the permission
/// record `$system_name`, scoped to `$tenant_id`.
pub(crate) const ACTION_IDS_BY_NAME: &str = "(SELECT VALUE meta::id(id) FROM permission_action \
     WHERE tenant_id = $tenant_id AND name = $action_name \
     AND permission_record_id IN (\
         SELECT VALUE meta::id(id) FROM permission_record \
         WHERE tenant_id = $tenant_id AND system_name = $system_name\
     ))";

#[derive(Debug, SurrealValue)]
struct RolePermissionActionRow {
    record_id: String,
    tenant_id: String,
    role_id: String,
    permission_action_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl RolePermissionActionRow {
    fn try_into_model(self) -> Result<RolePermissionAction, DbError> {
        Ok(RolePermissionAction {
            id: parse_uuid("role_permission_action", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            role_id: parse_uuid("role", &self.role_id)?,
            permission_action_id: parse_opt_uuid(
                "permission_action",
                self.permission_action_id.as_deref(),
            )?,
            created_at: self.created_at,
        })
    }
}

/// Backed by the `role_permission_action` table.
#[derive(Clone)]
pub struct SurrealRolePermissionActionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRolePermissionActionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<RolePermissionAction> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role_permission_action \
                 WHERE id = type::record('role_permission_action', $id) \
                 AND tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RolePermissionActionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role_permission_action".into(),
            id: id.to_string(),
        })?;
        Ok(row.try_into_model()?)
    }
}

impl<C: Connection> RolePermissionActionRepository for SurrealRolePermissionActionRepository<C> {
    async fn create(&self, input: CreateRolePermissionAction) -> BastionResult<RolePermissionAction> {
        ensure_exists(&self.db, "role", input.tenant_id, input.role_id).await?;
        ensure_exists(
            &self.db,
            "permission_action",
            input.tenant_id,
            input.permission_action_id,
        )
        .await?;

        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('role_permission_action', $id) SET \
                 tenant_id = $tenant_id, role_id = $role_id, \
                 permission_action_id = $permission_action_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("role_id", input.role_id.to_string()))
            .bind((
                "permission_action_id",
                input.permission_action_id.to_string(),
            ))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| statement_error("role_permission_action", e))?;

        self.get_by_id(input.tenant_id, id).await
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        self.get_by_id(tenant_id, id).await?;
        self.db
            .query(
                "DELETE type::record('role_permission_action', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| statement_error("role_permission_action", e))?;
        Ok(())
    }

    async fn find(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_system_name: &str,
        action_name: &str,
    ) -> BastionResult<Option<RolePermissionAction>> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM role_permission_action \
             WHERE tenant_id = $tenant_id AND role_id = $role_id \
             AND permission_action_id IN {ACTION_IDS_BY_NAME} \
             LIMIT 1"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .bind(("system_name", permission_system_name.to_string()))
            .bind(("action_name", action_name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RolePermissionActionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(RolePermissionActionRow::try_into_model)
            .transpose()?)
    }

    async fn list_by_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
    ) -> BastionResult<Vec<RolePermissionAction>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role_permission_action \
                 WHERE tenant_id = $tenant_id AND role_id = $role_id \
                 ORDER BY created_at ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RolePermissionActionRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_model())
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(items)
    }
}
