//! SurrealDB repository implementations.

mod permission;
mod refresh_token;
mod role;
mod role_permission_action;
mod tenant;
mod user;
mod user_permission_action;

pub use permission::SurrealPermissionRepository;
pub use refresh_token::SurrealRefreshTokenRepository;
pub use role::SurrealRoleRepository;
pub use role_permission_action::SurrealRolePermissionActionRepository;
pub use tenant::SurrealTenantRepository;
pub use user::{SurrealUserRepository, hash_password};
pub use user_permission_action::SurrealUserPermissionActionRepository;

use bastion_core::error::BastionResult;
use serde_json::Value;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, statement_error};

/// Row struct for `count() ... GROUP ALL` queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

/// Total from a `GROUP ALL` count; an empty table yields no row.
pub(crate) fn total_of(rows: Vec<CountRow>) -> u64 {
    rows.first().map_or(0, |r| r.total)
}

/// Two statements: the row count of `table`, then one page of it.
///
/// Binds expected: `$limit`, `$offset`, plus `$tenant_id` when
/// `tenant_scoped` is set.
pub(crate) fn page_sql(
    table: &str,
    projection: &str,
    tenant_scoped: bool,
    order_by: &str,
) -> String {
    let filter = if tenant_scoped {
        " WHERE tenant_id = $tenant_id"
    } else {
        ""
    };
    format!(
        "SELECT count() AS total FROM {table}{filter} GROUP ALL; \
         SELECT {projection} FROM {table}{filter} \
         ORDER BY {order_by} ASC LIMIT $limit START $offset;"
    )
}

/// Partial update of one record. Only supplied fields are written;
/// `updated_at` is always refreshed.
#[derive(Debug, Default)]
pub(crate) struct Patch {
    assignments: Vec<String>,
    values: Vec<(String, Value)>,
}

impl Patch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set<V: Into<Value>>(mut self, field: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.assignments.push(format!("{field} = ${field}"));
            self.values.push((field.to_string(), value.into()));
        }
        self
    }

    /// Like [`Patch::set`], but `Some(None)` clears the field.
    pub(crate) fn set_or_clear<V: Into<Value>>(
        mut self,
        field: &str,
        value: Option<Option<V>>,
    ) -> Self {
        match value {
            Some(None) => {
                self.assignments.push(format!("{field} = NONE"));
                self
            }
            other => self.set(field, other.flatten()),
        }
    }

    fn render(&self, table: &str, tenant_scoped: bool) -> String {
        let mut sql = format!("UPDATE type::record('{table}', $id) SET ");
        for assignment in &self.assignments {
            sql.push_str(assignment);
            sql.push_str(", ");
        }
        sql.push_str("updated_at = time::now()");
        if tenant_scoped {
            sql.push_str(" WHERE tenant_id = $tenant_id");
        }
        sql
    }

    /// Write the patch to `table:id`, restricted to `tenant_id` if given.
    pub(crate) async fn apply<C: Connection>(
        self,
        db: &Surreal<C>,
        table: &'static str,
        tenant_id: Option<Uuid>,
        id: Uuid,
    ) -> Result<(), DbError> {
        let mut query = db
            .query(self.render(table, tenant_id.is_some()))
            .bind(("id", id.to_string()));
        if let Some(tenant_id) = tenant_id {
            query = query.bind(("tenant_id", tenant_id.to_string()));
        }
        for binding in self.values {
            query = query.bind(binding);
        }

        query
            .await?
            .check()
            .map_err(|e| statement_error(table, e))?;
        Ok(())
    }
}

/// Fail with `NotFound` unless `table` holds a record `id` in `tenant_id`.
pub(crate) async fn ensure_exists<C: Connection>(
    db: &Surreal<C>,
    table: &'static str,
    tenant_id: Uuid,
    id: Uuid,
) -> BastionResult<()> {
    let query = format!(
        "SELECT count() AS total FROM {table} \
         WHERE id = type::record('{table}', $id) \
         AND tenant_id = $tenant_id GROUP ALL"
    );
    let mut result = db
        .query(query)
        .bind(("id", id.to_string()))
        .bind(("tenant_id", tenant_id.to_string()))
        .await
        .map_err(DbError::from)?;

    if total_of(result.take(0).map_err(DbError::from)?) == 0 {
        return Err(DbError::NotFound {
            entity: table.to_string(),
            id: id.to_string(),
        }
        .into());
    }
    Ok(())
}
