//! Refresh token domain model and the single-record-per-user upsert plan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The one live refresh-token record of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    /// SHA-256 (hex) of the latest signed token issued to the user.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A newly issued token as the refresh record stores it.
///
/// `token_hash` is the SHA-256 of the signed access token, never the
/// token itself. `expires_at` is the refresh record's own expiry
/// (`refresh_token_lifetime_days`), not the access token's `exp`; the
/// upsert plan compares the stored record's `expires_at` against now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertRefreshToken {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// What `upsert_active_for_user` must do with the existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenUpsertPlan {
    /// No record exists for the user.
    Insert,
    /// The record is still live; overwrite token, expiry and created-at.
    UpdateInPlace { id: Uuid },
    /// The record has expired; delete it and insert a fresh one.
    Replace { expired_id: Uuid },
}

/// Decide how to persist a newly issued token given the user's current
/// record (if any).
pub fn plan_refresh_token_upsert(
    existing: Option<&RefreshToken>,
    now: DateTime<Utc>,
) -> RefreshTokenUpsertPlan {
    match existing {
        None => RefreshTokenUpsertPlan::Insert,
        Some(token) if token.is_expired_at(now) => RefreshTokenUpsertPlan::Replace {
            expired_id: token.id,
        },
        Some(token) => RefreshTokenUpsertPlan::UpdateInPlace { id: token.id },
    }
}
