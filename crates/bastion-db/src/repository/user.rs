//! User storage. Passwords are stored as Argon2id PHC strings, optionally
//! peppered with a server-side secret.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use bastion_core::error::{BastionResult, require_non_empty};
use bastion_core::models::user::{CreateUser, UpdateUser, User, UserStatus};
use bastion_core::repository::{PaginatedResult, Pagination, UserRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{Patch, page_sql, total_of};
use crate::error::{DbError, parse_uuid, statement_error};

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    tenant_id: String,
    username: String,
    email: String,
    display_name: String,
    avatar: Option<String>,
    password_hash: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        let status = UserStatus::parse(&self.status)
            .ok_or_else(|| DbError::Decode(format!("unknown user status: {}", self.status)))?;
        Ok(User {
            id: parse_uuid("user", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            username: self.username,
            email: self.email,
            display_name: self.display_name,
            avatar: self.avatar,
            password_hash: self.password_hash,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Argon2id cost: 19 MiB of memory, two passes, one lane.
const ARGON2_MEMORY_KIB: u32 = 19 * 1024;
const ARGON2_PASSES: u32 = 2;
const ARGON2_LANES: u32 = 1;

/// Produce a salted Argon2id PHC string for `password`.
///
/// The pepper, when present, is prefixed to the password; verification
/// must apply the same pepper.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    let params = argon2::Params::new(ARGON2_MEMORY_KIB, ARGON2_PASSES, ARGON2_LANES, None)
        .map_err(|e| DbError::Query(format!("invalid argon2 parameters: {e}")))?;
    let hasher = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let secret = [pepper.unwrap_or_default(), password].concat();
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);

    hasher
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DbError::Query(format!("hashing password failed: {e}")))
}

/// Tenant-scoped user accounts. Clone shares the connection.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: Option<String>) -> Self {
        Self { db, pepper }
    }

    async fn fetch_one(
        &self,
        tenant_id: Uuid,
        filter: &str,
        value: String,
    ) -> BastionResult<User> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM user \
             WHERE tenant_id = $tenant_id AND {filter}"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("value", value.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: value,
        })?;
        Ok(row.try_into_user()?)
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> BastionResult<User> {
        require_non_empty("username", &input.username)?;
        require_non_empty("email", &input.email)?;
        require_non_empty("password", &input.password)?;

        let id = Uuid::new_v4();
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;
        let display_name = if input.display_name.trim().is_empty() {
            input.username.clone()
        } else {
            input.display_name
        };

        self.db
            .query(
                "CREATE type::record('user', $id) SET \
                 tenant_id = $tenant_id, \
                 username = $username, email = $email, \
                 display_name = $display_name, avatar = $avatar, \
                 password_hash = $password_hash, \
                 status = $status",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .bind(("display_name", display_name))
            .bind(("avatar", input.avatar))
            .bind(("password_hash", password_hash))
            .bind(("status", UserStatus::Active.as_str()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| statement_error("user", e))?;

        self.get_by_id(input.tenant_id, id).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<User> {
        self.fetch_one(tenant_id, "id = type::record('user', $value)", id.to_string())
            .await
    }

    async fn get_by_username(&self, tenant_id: Uuid, username: &str) -> BastionResult<User> {
        self.fetch_one(tenant_id, "username = $value", username.to_string())
            .await
    }

    async fn get_by_email(&self, tenant_id: Uuid, email: &str) -> BastionResult<User> {
        self.fetch_one(tenant_id, "email = $value", email.to_string())
            .await
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateUser) -> BastionResult<User> {
        self.get_by_id(tenant_id, id).await?;

        Patch::new()
            .set("username", input.username)
            .set("email", input.email)
            .set("display_name", input.display_name)
            .set_or_clear("avatar", input.avatar)
            .set("status", input.status.map(|status| status.as_str()))
            .apply(&self.db, "user", Some(tenant_id), id)
            .await?;

        self.get_by_id(tenant_id, id).await
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        self.update(
            tenant_id,
            id,
            UpdateUser {
                status: Some(UserStatus::Inactive),
                ..Default::default()
            },
        )
        .await?;
        Ok(())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> BastionResult<PaginatedResult<User>> {
        let mut result = self
            .db
            .query(page_sql("user", "meta::id(id) AS record_id, *", true, "created_at"))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let total = total_of(result.take(0).map_err(DbError::from)?);
        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let users = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaginatedResult::new(users, total, &pagination))
    }
}
