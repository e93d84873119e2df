//! Each user owns at most one refresh token record per tenant, enforced by
//! the `idx_refresh_token_user` unique index. Issuing a new token rewrites
//! that record instead of adding rows.
//!
//! Concurrent issues for one user race on that index. The loser re-reads
//! the record and re-plans, so the second writer updates what the first
//! one created.

use bastion_core::error::BastionResult;
use bastion_core::models::refresh_token::{
    RefreshToken, RefreshTokenUpsertPlan, UpsertRefreshToken, plan_refresh_token_upsert,
};
use bastion_core::repository::RefreshTokenRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::total_of;
use crate::error::{DbError, parse_uuid};
use crate::transaction::{Transaction, lost_write_race, run_in_transaction};

/// One initial try plus retries after losing a race to a concurrent issue.
const UPSERT_ATTEMPTS: u32 = 4;

#[derive(Debug, SurrealValue)]
struct RefreshTokenRow {
    record_id: String,
    tenant_id: String,
    user_id: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    fn try_into_token(self) -> Result<RefreshToken, DbError> {
        Ok(RefreshToken {
            id: parse_uuid("refresh_token", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            user_id: parse_uuid("user", &self.user_id)?,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

fn stage_insert(tx: &mut Transaction, input: &UpsertRefreshToken) {
    tx.statement(
        "CREATE type::record('refresh_token', $new_id) SET \
         tenant_id = $tenant_id, user_id = $user_id, \
         token_hash = $token_hash, \
         expires_at = <datetime>$expires_at, \
         created_at = time::now()",
    )
    .bind("new_id", Uuid::new_v4().to_string())
    .bind("tenant_id", input.tenant_id.to_string())
    .bind("user_id", input.user_id.to_string())
    .bind("token_hash", input.token_hash.clone())
    .bind("expires_at", input.expires_at.to_rfc3339());
}

fn stage_plan(tx: &mut Transaction, plan: RefreshTokenUpsertPlan, input: &UpsertRefreshToken) {
    match plan {
        RefreshTokenUpsertPlan::Insert => stage_insert(tx, input),
        RefreshTokenUpsertPlan::UpdateInPlace { id } => {
            tx.statement(
                "UPDATE type::record('refresh_token', $id) SET \
                 token_hash = $token_hash, \
                 expires_at = <datetime>$expires_at, \
                 created_at = time::now()",
            )
            .bind("id", id.to_string())
            .bind("token_hash", input.token_hash.clone())
            .bind("expires_at", input.expires_at.to_rfc3339());
        }
        RefreshTokenUpsertPlan::Replace { expired_id } => {
            tx.statement("DELETE type::record('refresh_token', $expired_id)")
                .bind("expired_id", expired_id.to_string());
            stage_insert(tx, input);
        }
    }
}

#[derive(Clone)]
pub struct SurrealRefreshTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRefreshTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RefreshTokenRepository for SurrealRefreshTokenRepository<C> {
    async fn get_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> BastionResult<Option<RefreshToken>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE tenant_id = $tenant_id AND user_id = $user_id \
                 LIMIT 1",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(RefreshTokenRow::try_into_token)
            .transpose()?)
    }

    async fn upsert_active_for_user(&self, input: UpsertRefreshToken) -> BastionResult<RefreshToken> {
        for attempt in 1..=UPSERT_ATTEMPTS {
            let existing = self.get_for_user(input.tenant_id, input.user_id).await?;
            let plan = plan_refresh_token_upsert(existing.as_ref(), Utc::now());
            debug!(user_id = %input.user_id, ?plan, attempt, "upserting refresh token");

            match run_in_transaction(&self.db, |tx| {
                stage_plan(tx, plan, &input);
                Ok(())
            })
            .await
            {
                Ok(()) => {}
                Err(err) if attempt < UPSERT_ATTEMPTS && lost_write_race(&err) => {
                    debug!(user_id = %input.user_id, error = %err, "refresh token raced; replanning");
                    continue;
                }
                Err(err) => return Err(err),
            }

            // An in-place update of a record deleted meanwhile writes nothing.
            if let Some(token) = self.get_for_user(input.tenant_id, input.user_id).await? {
                return Ok(token);
            }
        }

        Err(DbError::NotFound {
            entity: "refresh_token".into(),
            id: input.user_id.to_string(),
        }
        .into())
    }

    async fn delete_for_user(&self, tenant_id: Uuid, user_id: Uuid) -> BastionResult<()> {
        self.db
            .query(
                "DELETE refresh_token \
                 WHERE tenant_id = $tenant_id AND user_id = $user_id",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }

    async fn cleanup_expired(&self, tenant_id: Uuid) -> BastionResult<u64> {
        let mut result = self
            .db
            .query(
                "LET $cutoff = time::now(); \
                 SELECT count() AS total FROM refresh_token \
                 WHERE tenant_id = $tenant_id AND expires_at <= $cutoff GROUP ALL; \
                 DELETE refresh_token \
                 WHERE tenant_id = $tenant_id AND expires_at <= $cutoff;",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let removed = total_of(result.take(1).map_err(DbError::from)?);
        debug!(%tenant_id, removed, "expired refresh tokens removed");
        Ok(removed)
    }
}
