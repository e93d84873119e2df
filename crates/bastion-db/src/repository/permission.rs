//! Permission records, their actions, and role grants.
//!
//! A permission record's granted role ids are derived from the `grants`
//! edge table (role -> permission_record) on every read.

use bastion_core::error::{BastionResult, require_non_empty};
use bastion_core::models::permission::{
    CreatePermissionAction, CreatePermissionRecord, PermissionAction, PermissionRecord,
    UpdatePermissionAction, UpdatePermissionRecord,
};
use bastion_core::repository::{PaginatedResult, Pagination, PermissionRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{Patch, ensure_exists, page_sql, total_of};
use crate::error::{DbError, parse_uuid, statement_error};
use crate::transaction::run_in_transaction;

/// Projection shared by every permission record read.
const RECORD_PROJECTION: &str = "meta::id(id) AS record_id, tenant_id, name, system_name, \
     category, created_at, updated_at, \
     (SELECT VALUE meta::id(in) FROM grants WHERE out = $parent.id) AS granted_role_ids";

#[derive(Debug, SurrealValue)]
struct PermissionRecordRow {
    record_id: String,
    tenant_id: String,
    name: String,
    system_name: String,
    category: String,
    granted_role_ids: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PermissionRecordRow {
    fn try_into_record(self) -> Result<PermissionRecord, DbError> {
        let granted_role_ids = self
            .granted_role_ids
            .iter()
            .map(|raw| parse_uuid("granted role", raw))
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(PermissionRecord {
            id: parse_uuid("permission_record", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            name: self.name,
            system_name: self.system_name,
            category: self.category,
            granted_role_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct PermissionActionRow {
    record_id: String,
    tenant_id: String,
    permission_record_id: String,
    name: String,
    system_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PermissionActionRow {
    fn try_into_action(self) -> Result<PermissionAction, DbError> {
        Ok(PermissionAction {
            id: parse_uuid("permission_action", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            permission_record_id: parse_uuid("permission_record", &self.permission_record_id)?,
            name: self.name,
            system_name: self.system_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Records and actions share one repository; actions never outlive their record.
#[derive(Clone)]
pub struct SurrealPermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn query_records(
        &self,
        tenant_id: Uuid,
        filter: &str,
        value: String,
    ) -> BastionResult<Vec<PermissionRecord>> {
        let query = format!(
            "SELECT {RECORD_PROJECTION} FROM permission_record \
             WHERE tenant_id = $tenant_id AND {filter} \
             ORDER BY system_name ASC"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("value", value))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRecordRow> = result.take(0).map_err(DbError::from)?;
        let records = rows
            .into_iter()
            .map(|row| row.try_into_record())
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(records)
    }
}

impl<C: Connection> PermissionRepository for SurrealPermissionRepository<C> {
    async fn create(&self, input: CreatePermissionRecord) -> BastionResult<PermissionRecord> {
        require_non_empty("name", &input.name)?;
        require_non_empty("system_name", &input.system_name)?;

        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('permission_record', $id) SET \
                 tenant_id = $tenant_id, name = $name, \
                 system_name = $system_name, category = $category",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("name", input.name))
            .bind(("system_name", input.system_name))
            .bind(("category", input.category))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| statement_error("permission_record", e))?;

        self.get_by_id(input.tenant_id, id).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<PermissionRecord> {
        self.query_records(
            tenant_id,
            "id = type::record('permission_record', $value)",
            id.to_string(),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            DbError::NotFound {
                entity: "permission_record".into(),
                id: id.to_string(),
            }
            .into()
        })
    }

    async fn find_by_system_name(
        &self,
        tenant_id: Uuid,
        system_name: &str,
    ) -> BastionResult<Option<PermissionRecord>> {
        Ok(self
            .query_records(tenant_id, "system_name = $value", system_name.to_string())
            .await?
            .into_iter()
            .next())
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePermissionRecord,
    ) -> BastionResult<PermissionRecord> {
        self.get_by_id(tenant_id, id).await?;

        Patch::new()
            .set("name", input.name)
            .set("system_name", input.system_name)
            .set("category", input.category)
            .apply(&self.db, "permission_record", Some(tenant_id), id)
            .await?;

        self.get_by_id(tenant_id, id).await
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        self.get_by_id(tenant_id, id).await?;

        // Actions and grants cascade; rows pointing at the removed actions
        // keep existing with a null reference.
        run_in_transaction(&self.db, |tx| {
            tx.statement(
                "LET $actions = (SELECT VALUE meta::id(id) FROM permission_action \
                 WHERE tenant_id = $tenant_id AND permission_record_id = $record_id)",
            )
            .statement(
                "UPDATE role_permission_action SET permission_action_id = NONE \
                 WHERE tenant_id = $tenant_id AND permission_action_id IN $actions",
            )
            .statement(
                "UPDATE user_permission_action SET permission_action_id = NONE, \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id AND permission_action_id IN $actions",
            )
            .statement(
                "DELETE permission_action \
                 WHERE tenant_id = $tenant_id AND permission_record_id = $record_id",
            )
            .statement("DELETE grants WHERE out = type::record('permission_record', $record_id)")
            .statement(
                "DELETE type::record('permission_record', $record_id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind("record_id", id.to_string())
            .bind("tenant_id", tenant_id.to_string());
            Ok(())
        })
        .await
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> BastionResult<PaginatedResult<PermissionRecord>> {
        let mut result = self
            .db
            .query(page_sql(
                "permission_record",
                RECORD_PROJECTION,
                true,
                "system_name",
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let total = total_of(result.take(0).map_err(DbError::from)?);
        let rows: Vec<PermissionRecordRow> = result.take(1).map_err(DbError::from)?;
        let records = rows
            .into_iter()
            .map(PermissionRecordRow::try_into_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaginatedResult::new(records, total, &pagination))
    }

    async fn list_by_category(
        &self,
        tenant_id: Uuid,
        category: &str,
    ) -> BastionResult<Vec<PermissionRecord>> {
        self.query_records(tenant_id, "category = $value", category.to_string())
            .await
    }

    async fn grant_to_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> BastionResult<()> {
        ensure_exists(&self.db, "role", tenant_id, role_id).await?;
        self.get_by_id(tenant_id, permission_id).await?;

        let role_id_str = role_id.to_string();
        let permission_id_str = permission_id.to_string();

        // Granting twice leaves a single edge.
        run_in_transaction(&self.db, |tx| {
            tx.statement(
                "DELETE grants WHERE \
                 in = type::record('role', $role_id) AND \
                 out = type::record('permission_record', $permission_id)",
            )
            .statement(format!(
                "RELATE role:`{role_id_str}` -> grants -> \
                 permission_record:`{permission_id_str}`"
            ))
            .bind("role_id", role_id_str.clone())
            .bind("permission_id", permission_id_str.clone());
            Ok(())
        })
        .await
    }

    async fn revoke_from_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> BastionResult<()> {
        ensure_exists(&self.db, "role", tenant_id, role_id).await?;
        ensure_exists(&self.db, "permission_record", tenant_id, permission_id).await?;

        self.db
            .query(
                "DELETE grants WHERE \
                 in = type::record('role', $role_id) AND \
                 out = type::record('permission_record', $permission_id) AND \
                 in.tenant_id = $tenant_id AND out.tenant_id = $tenant_id",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .bind(("permission_id", permission_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| statement_error("grants", e))?;

        Ok(())
    }

    async fn get_role_permissions(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
    ) -> BastionResult<Vec<PermissionRecord>> {
        self.query_records(
            tenant_id,
            "id IN (SELECT VALUE out FROM grants \
             WHERE in = type::record('role', $value))",
            role_id.to_string(),
        )
        .await
    }

    async fn create_action(&self, input: CreatePermissionAction) -> BastionResult<PermissionAction> {
        require_non_empty("name", &input.name)?;
        require_non_empty("system_name", &input.system_name)?;
        self.get_by_id(input.tenant_id, input.permission_record_id)
            .await?;

        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('permission_action', $id) SET \
                 tenant_id = $tenant_id, \
                 permission_record_id = $permission_record_id, \
                 name = $name, system_name = $system_name",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind((
                "permission_record_id",
                input.permission_record_id.to_string(),
            ))
            .bind(("name", input.name))
            .bind(("system_name", input.system_name))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| statement_error("permission_action", e))?;

        self.get_action(input.tenant_id, id).await
    }

    async fn get_action(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<PermissionAction> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission_action \
                 WHERE id = type::record('permission_action', $id) \
                 AND tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionActionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission_action".into(),
            id: id.to_string(),
        })?;
        Ok(row.try_into_action()?)
    }

    async fn update_action(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePermissionAction,
    ) -> BastionResult<PermissionAction> {
        self.get_action(tenant_id, id).await?;

        Patch::new()
            .set("name", input.name)
            .set("system_name", input.system_name)
            .apply(&self.db, "permission_action", Some(tenant_id), id)
            .await?;

        self.get_action(tenant_id, id).await
    }

    async fn delete_action(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        self.get_action(tenant_id, id).await?;

        run_in_transaction(&self.db, |tx| {
            tx.statement(
                "UPDATE role_permission_action SET permission_action_id = NONE \
                 WHERE tenant_id = $tenant_id AND permission_action_id = $action_id",
            )
            .statement(
                "UPDATE user_permission_action SET permission_action_id = NONE, \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id AND permission_action_id = $action_id",
            )
            .statement(
                "DELETE type::record('permission_action', $action_id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind("action_id", id.to_string())
            .bind("tenant_id", tenant_id.to_string());
            Ok(())
        })
        .await
    }

    async fn list_actions(
        &self,
        tenant_id: Uuid,
        permission_record_id: Uuid,
    ) -> BastionResult<Vec<PermissionAction>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission_action \
                 WHERE tenant_id = $tenant_id \
                 AND permission_record_id = $permission_record_id \
                 ORDER BY name ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("permission_record_id", permission_record_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionActionRow> = result.take(0).map_err(DbError::from)?;
        let actions = rows
            .into_iter()
            .map(|row| row.try_into_action())
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(actions)
    }
}
