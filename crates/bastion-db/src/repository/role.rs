//! Roles and the `has_role` edges that assign them to users.

use bastion_core::error::{BastionResult, require_non_empty};
use bastion_core::models::role::{CreateRole, Role, UpdateRole};
use bastion_core::repository::{PaginatedResult, Pagination, RoleRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{Patch, ensure_exists, page_sql, total_of};
use crate::error::{DbError, parse_uuid, statement_error};
use crate::transaction::run_in_transaction;

#[derive(Debug, SurrealValue)]
struct RoleRow {
    record_id: String,
    tenant_id: String,
    name: String,
    description: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    fn try_into_role(self) -> Result<Role, DbError> {
        Ok(Role {
            id: parse_uuid("role", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            name: self.name,
            description: self.description,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Tenant-scoped roles.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> BastionResult<Role> {
        require_non_empty("name", &input.name)?;

        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('role', $id) SET \
                 tenant_id = $tenant_id, \
                 name = $name, description = $description, \
                 is_active = $is_active",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("is_active", input.is_active))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| statement_error("role", e))?;

        self.get_by_id(input.tenant_id, id).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<Role> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE id = type::record('role', $id) \
                 AND tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id.to_string(),
        })?;
        Ok(row.try_into_role()?)
    }

    async fn get_by_name(&self, tenant_id: Uuid, name: &str) -> BastionResult<Option<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE tenant_id = $tenant_id AND name = $name",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(RoleRow::try_into_role)
            .transpose()?)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateRole) -> BastionResult<Role> {
        self.get_by_id(tenant_id, id).await?;

        Patch::new()
            .set("name", input.name)
            .set("description", input.description)
            .set("is_active", input.is_active)
            .apply(&self.db, "role", Some(tenant_id), id)
            .await?;

        self.get_by_id(tenant_id, id).await
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        self.get_by_id(tenant_id, id).await?;

        // Edges and role action rows go with the role.
        run_in_transaction(&self.db, |tx| {
            tx.statement("DELETE has_role WHERE out = type::record('role', $role_id)")
                .statement("DELETE grants WHERE in = type::record('role', $role_id)")
                .statement(
                    "DELETE role_permission_action \
                     WHERE tenant_id = $tenant_id AND role_id = $role_id",
                )
                .statement("DELETE type::record('role', $role_id) WHERE tenant_id = $tenant_id")
                .bind("role_id", id.to_string())
                .bind("tenant_id", tenant_id.to_string());
            Ok(())
        })
        .await
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> BastionResult<PaginatedResult<Role>> {
        let mut result = self
            .db
            .query(page_sql("role", "meta::id(id) AS record_id, *", true, "created_at"))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let total = total_of(result.take(0).map_err(DbError::from)?);
        let rows: Vec<RoleRow> = result.take(1).map_err(DbError::from)?;
        let roles = rows
            .into_iter()
            .map(RoleRow::try_into_role)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaginatedResult::new(roles, total, &pagination))
    }

    async fn assign_to_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
    ) -> BastionResult<()> {
        ensure_exists(&self.db, "user", tenant_id, user_id).await?;
        self.get_by_id(tenant_id, role_id).await?;

        let user_id_str = user_id.to_string();
        let role_id_str = role_id.to_string();

        // Re-assigning an existing role leaves a single edge.
        run_in_transaction(&self.db, |tx| {
            tx.statement(
                "DELETE has_role WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('role', $role_id)",
            )
            .statement(format!(
                "RELATE user:`{user_id_str}` -> has_role -> role:`{role_id_str}`"
            ))
            .bind("user_id", user_id_str.clone())
            .bind("role_id", role_id_str.clone());
            Ok(())
        })
        .await
    }

    async fn unassign_from_user(
        &self,
        _tenant_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
    ) -> BastionResult<()> {
        self.db
            .query(
                "DELETE has_role WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('role', $role_id)",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| statement_error("has_role", e))?;

        Ok(())
    }

    async fn get_user_roles(&self, tenant_id: Uuid, user_id: Uuid) -> BastionResult<Vec<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE tenant_id = $tenant_id \
                 AND id IN (\
                     SELECT VALUE out FROM has_role \
                     WHERE in = type::record('user', $user_id)\
                 ) \
                 ORDER BY name ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let roles = rows
            .into_iter()
            .map(|row| row.try_into_role())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(roles)
    }
}
