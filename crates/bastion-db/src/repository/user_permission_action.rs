//! Per-user allow/deny overrides for single actions.

use bastion_core::error::BastionResult;
use bastion_core::models::permission::{SetUserPermissionAction, UserPermissionAction};
use bastion_core::repository::UserPermissionActionRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::ensure_exists;
use super::role_permission_action::ACTION_IDS_BY_NAME;
use crate::error::{DbError, parse_opt_uuid, parse_uuid, statement_error};

#[derive(Debug, SurrealValue)]
struct UserPermissionActionRow {
    record_id: String,
    tenant_id: String,
    user_id: String,
    permission_action_id: Option<String>,
    is_allowed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserPermissionActionRow {
    fn try_into_model(self) -> Result<UserPermissionAction, DbError> {
        Ok(UserPermissionAction {
            id: parse_uuid("user_permission_action", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            user_id: parse_uuid("user", &self.user_id)?,
            permission_action_id: parse_opt_uuid(
                "permission_action",
                self.permission_action_id.as_deref(),
            )?,
            is_allowed: self.is_allowed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealUserPermissionActionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserPermissionActionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn select_one(
        &self,
        filter: &str,
        tenant_id: Uuid,
        bindings: Vec<(&'static str, String)>,
    ) -> BastionResult<Option<UserPermissionAction>> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM user_permission_action \
             WHERE tenant_id = $tenant_id AND {filter} LIMIT 1"
        );
        let mut builder = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()));
        for binding in bindings {
            builder = builder.bind(binding);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let rows: Vec<UserPermissionActionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(UserPermissionActionRow::try_into_model)
            .transpose()?)
    }
}

impl<C: Connection> UserPermissionActionRepository for SurrealUserPermissionActionRepository<C> {
    async fn set(&self, input: SetUserPermissionAction) -> BastionResult<UserPermissionAction> {
        ensure_exists(&self.db, "user", input.tenant_id, input.user_id).await?;
        ensure_exists(
            &self.db,
            "permission_action",
            input.tenant_id,
            input.permission_action_id,
        )
        .await?;

        let user_id = input.user_id.to_string();
        let action_id = input.permission_action_id.to_string();

        let existing = self
            .select_one(
                "user_id = $user_id AND permission_action_id = $action_id",
                input.tenant_id,
                vec![("user_id", user_id.clone()), ("action_id", action_id.clone())],
            )
            .await?;

        let id = match existing {
            Some(current) => {
                self.db
                    .query(
                        "UPDATE type::record('user_permission_action', $id) SET \
                         is_allowed = $is_allowed, updated_at = time::now()",
                    )
                    .bind(("id", current.id.to_string()))
                    .bind(("is_allowed", input.is_allowed))
                    .await
                    .map_err(DbError::from)?
                    .check()
                    .map_err(|e| statement_error("user_permission_action", e))?;
                current.id
            }
            None => {
                let id = Uuid::new_v4();
                self.db
                    .query(
                        "CREATE type::record('user_permission_action', $id) SET \
                         tenant_id = $tenant_id, user_id = $user_id, \
                         permission_action_id = $action_id, is_allowed = $is_allowed",
                    )
                    .bind(("id", id.to_string()))
                    .bind(("tenant_id", input.tenant_id.to_string()))
                    .bind(("user_id", user_id))
                    .bind(("action_id", action_id))
                    .bind(("is_allowed", input.is_allowed))
                    .await
                    .map_err(DbError::from)?
                    .check()
                    .map_err(|e| statement_error("user_permission_action", e))?;
                id
            }
        };

        self.select_one(
            "id = type::record('user_permission_action', $id)",
            input.tenant_id,
            vec![("id", id.to_string())],
        )
        .await?
        .ok_or_else(|| {
            DbError::NotFound {
                entity: "user_permission_action".into(),
                id: id.to_string(),
            }
            .into()
        })
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        ensure_exists(&self.db, "user_permission_action", tenant_id, id).await?;
        self.db
            .query(
                "DELETE type::record('user_permission_action', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| statement_error("user_permission_action", e))?;
        Ok(())
    }

    async fn find(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        permission_system_name: &str,
        action_name: &str,
    ) -> BastionResult<Option<UserPermissionAction>> {
        let filter = format!("user_id = $user_id AND permission_action_id IN {ACTION_IDS_BY_NAME}");
        self.select_one(
            &filter,
            tenant_id,
            vec![
                ("user_id", user_id.to_string()),
                ("system_name", permission_system_name.to_string()),
                ("action_name", action_name.to_string()),
            ],
        )
        .await
    }

    async fn list_by_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> BastionResult<Vec<UserPermissionAction>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user_permission_action \
                 WHERE tenant_id = $tenant_id AND user_id = $user_id \
                 ORDER BY created_at ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserPermissionActionRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_model())
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(items)
    }
}
