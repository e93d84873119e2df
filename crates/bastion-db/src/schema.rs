//! Versioned SurrealQL migrations.
//!
//! Every table is SCHEMAFULL. Ids and foreign keys are UUID strings; the
//! user status column is constrained to the `UserStatus` spellings.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

const SCHEMA_V1: &str = "\
-- tenants (global scope)
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON tenant TYPE string;
DEFINE FIELD slug ON tenant TYPE string;
DEFINE FIELD created_at ON tenant TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON tenant TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON tenant COLUMNS slug UNIQUE;

-- users (tenant scope)
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON user TYPE string;
DEFINE FIELD username ON user TYPE string;
DEFINE FIELD email ON user TYPE string;
DEFINE FIELD display_name ON user TYPE string;
DEFINE FIELD avatar ON user TYPE option<string>;
DEFINE FIELD password_hash ON user TYPE string;
DEFINE FIELD status ON user TYPE string \
    ASSERT $value IN ['Active', 'Inactive', 'Locked', 'PendingVerification'];
DEFINE FIELD created_at ON user TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON user TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_user_tenant_username ON user COLUMNS tenant_id, username UNIQUE;
DEFINE INDEX idx_user_tenant_email ON user COLUMNS tenant_id, email UNIQUE;

-- roles (tenant scope)
DEFINE TABLE role SCHEMAFULL;
DEFINE FIELD tenant_id ON role TYPE string;
DEFINE FIELD name ON role TYPE string;
DEFINE FIELD description ON role TYPE string;
DEFINE FIELD is_active ON role TYPE bool DEFAULT true;
DEFINE FIELD created_at ON role TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON role TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_role_tenant_name ON role COLUMNS tenant_id, name UNIQUE;

-- permission records (tenant scope)
DEFINE TABLE permission_record SCHEMAFULL;
DEFINE FIELD tenant_id ON permission_record TYPE string;
DEFINE FIELD name ON permission_record TYPE string;
DEFINE FIELD system_name ON permission_record TYPE string;
DEFINE FIELD category ON permission_record TYPE string;
DEFINE FIELD created_at ON permission_record TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON permission_record TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_permission_record_system_name ON permission_record \
    COLUMNS tenant_id, system_name UNIQUE;
DEFINE INDEX idx_permission_record_category ON permission_record \
    COLUMNS tenant_id, category;

-- permission actions (tenant scope, owned by a permission record)
DEFINE TABLE permission_action SCHEMAFULL;
DEFINE FIELD tenant_id ON permission_action TYPE string;
DEFINE FIELD permission_record_id ON permission_action TYPE string;
DEFINE FIELD name ON permission_action TYPE string;
DEFINE FIELD system_name ON permission_action TYPE string;
DEFINE FIELD created_at ON permission_action TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON permission_action TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_permission_action_record ON permission_action \
    COLUMNS tenant_id, permission_record_id;

-- role action rows (tenant scope; action reference nulled on delete)
DEFINE TABLE role_permission_action SCHEMAFULL;
DEFINE FIELD tenant_id ON role_permission_action TYPE string;
DEFINE FIELD role_id ON role_permission_action TYPE string;
DEFINE FIELD permission_action_id ON role_permission_action TYPE option<string>;
DEFINE FIELD created_at ON role_permission_action TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_role_permission_action_role ON role_permission_action \
    COLUMNS tenant_id, role_id;

-- user overrides (tenant scope; action reference nulled on delete)
DEFINE TABLE user_permission_action SCHEMAFULL;
DEFINE FIELD tenant_id ON user_permission_action TYPE string;
DEFINE FIELD user_id ON user_permission_action TYPE string;
DEFINE FIELD permission_action_id ON user_permission_action TYPE option<string>;
DEFINE FIELD is_allowed ON user_permission_action TYPE bool;
DEFINE FIELD created_at ON user_permission_action TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON user_permission_action TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_user_permission_action_user ON user_permission_action \
    COLUMNS tenant_id, user_id;

-- refresh tokens (tenant scope, one record per user)
DEFINE TABLE refresh_token SCHEMAFULL;
DEFINE FIELD tenant_id ON refresh_token TYPE string;
DEFINE FIELD user_id ON refresh_token TYPE string;
DEFINE FIELD token_hash ON refresh_token TYPE string;
DEFINE FIELD expires_at ON refresh_token TYPE datetime;
DEFINE FIELD created_at ON refresh_token TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_refresh_token_user ON refresh_token COLUMNS tenant_id, user_id UNIQUE;

-- user -> role
DEFINE TABLE has_role TYPE RELATION SCHEMAFULL;

-- role -> permission_record
DEFINE TABLE grants TYPE RELATION SCHEMAFULL;
";

/// Highest migration version recorded in `_migration`, or 0 on a fresh
/// database.
async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let rows: Vec<MigrationRecord> = result.take(0)?;
    Ok(rows.first().map_or(0, |row| row.version))
}

/// Bring the schema up to date. Safe to call on every start; migrations
/// already recorded in `_migration` are skipped.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("migration table: {e}")))?;

    let applied = applied_version(db).await?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > applied);

    for migration in pending {
        info!(version = migration.version, name = migration.name, "applying migration");

        db.query(migration.sql)
            .query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "v{} ({}): {e}",
                    migration.version, migration.name
                ))
            })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_strictly_increase() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
        assert_eq!(MIGRATIONS.first().map(|m| m.version), Some(1));
    }

    #[test]
    fn refresh_tokens_are_unique_per_user() {
        assert!(SCHEMA_V1.contains("ON refresh_token COLUMNS tenant_id, user_id UNIQUE"));
    }

    #[tokio::test]
    async fn rerunning_is_a_no_op() {
        let db = Surreal::new::<surrealdb::engine::local::Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();

        run_migrations(&db).await.unwrap();
        run_migrations(&db).await.unwrap();
        assert_eq!(applied_version(&db).await.unwrap(), 1);
    }
}
