//! Tenants: the global scope every other record hangs off.

use bastion_core::error::{BastionResult, require_non_empty};
use bastion_core::models::tenant::{CreateTenant, Tenant, UpdateTenant};
use bastion_core::repository::{PaginatedResult, Pagination, TenantRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{Patch, page_sql, total_of};
use crate::error::{DbError, parse_uuid, statement_error};

#[derive(Debug, SurrealValue)]
struct TenantRow {
    record_id: String,
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRow {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id: parse_uuid("tenant", &self.record_id)?,
            name: self.name,
            slug: self.slug,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(&self, filter: &str, key: &str, value: String) -> BastionResult<Tenant> {
        let query = format!("SELECT meta::id(id) AS record_id, * FROM tenant WHERE {filter}");
        let mut result = self
            .db
            .query(query)
            .bind(("value", value.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: format!("{key}={value}"),
        })?;
        Ok(row.try_into_tenant()?)
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> BastionResult<Tenant> {
        require_non_empty("name", &input.name)?;
        require_non_empty("slug", &input.slug)?;

        let id = Uuid::new_v4();

        self.db
            .query("CREATE type::record('tenant', $id) SET name = $name, slug = $slug")
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| statement_error("tenant", e))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> BastionResult<Tenant> {
        self.fetch_one("id = type::record('tenant', $value)", "id", id.to_string())
            .await
    }

    async fn get_by_slug(&self, slug: &str) -> BastionResult<Tenant> {
        self.fetch_one("slug = $value", "slug", slug.to_string())
            .await
    }

    async fn update(&self, id: Uuid, input: UpdateTenant) -> BastionResult<Tenant> {
        // UPDATE on a missing record id is a no-op, so resolve first.
        self.get_by_id(id).await?;

        Patch::new()
            .set("name", input.name)
            .set("slug", input.slug)
            .apply(&self.db, "tenant", None, id)
            .await?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> BastionResult<()> {
        self.get_by_id(id).await?;
        self.db
            .query("DELETE type::record('tenant', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| statement_error("tenant", e))?;
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> BastionResult<PaginatedResult<Tenant>> {
        let mut result = self
            .db
            .query(page_sql("tenant", "meta::id(id) AS record_id, *", false, "created_at"))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let total = total_of(result.take(0).map_err(DbError::from)?);
        let rows: Vec<TenantRow> = result.take(1).map_err(DbError::from)?;
        let tenants = rows
            .into_iter()
            .map(TenantRow::try_into_tenant)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaginatedResult::new(tenants, total, &pagination))
    }
}
