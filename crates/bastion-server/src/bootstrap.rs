//! Startup seeding: the default tenant, the administrator role, and the
//! configured permission records granted to it. Safe to run on every
//! start.

use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::permission::CreatePermissionRecord;
use bastion_core::models::role::CreateRole;
use bastion_core::models::tenant::{CreateTenant, Tenant};
use bastion_core::repository::{PermissionRepository, RoleRepository, TenantRepository};
use bastion_db::repository::{
    SurrealPermissionRepository, SurrealRoleRepository, SurrealTenantRepository,
};
use surrealdb::{Connection, Surreal};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::BootstrapConfig;

/// What a seeding run found or created.
#[derive(Debug, Clone)]
pub struct SeedReport {
    pub tenant_id: Uuid,
    pub admin_role_id: Uuid,
    pub permissions_created: usize,
}

async fn ensure_tenant<C: Connection>(
    tenants: &SurrealTenantRepository<C>,
    config: &BootstrapConfig,
) -> BastionResult<Tenant> {
    match tenants.get_by_slug(&config.tenant_slug).await {
        Ok(tenant) => Ok(tenant),
        Err(BastionError::NotFound { .. }) => {
            info!(slug = %config.tenant_slug, "creating default tenant");
            tenants
                .create(CreateTenant {
                    name: config.tenant_name.clone(),
                    slug: config.tenant_slug.clone(),
                })
                .await
        }
        Err(e) => Err(e),
    }
}

#[instrument(skip_all, fields(tenant = %config.tenant_slug))]
pub async fn seed<C: Connection>(
    db: &Surreal<C>,
    config: &BootstrapConfig,
) -> BastionResult<SeedReport> {
    let tenant = ensure_tenant(&SurrealTenantRepository::new(db.clone()), config).await?;

    let roles = SurrealRoleRepository::new(db.clone());
    let admin = match roles.get_by_name(tenant.id, &config.admin_role).await? {
        Some(role) => role,
        None => {
            info!(role = %config.admin_role, "creating administrator role");
            roles
                .create(CreateRole {
                    tenant_id: tenant.id,
                    name: config.admin_role.clone(),
                    description: "Holds every seeded permission".into(),
                    is_active: true,
                })
                .await?
        }
    };

    let permissions = SurrealPermissionRepository::new(db.clone());
    let mut created = 0;
    for seed in &config.permissions {
        let record = match permissions
            .find_by_system_name(tenant.id, &seed.system_name)
            .await?
        {
            Some(record) => record,
            None => {
                created += 1;
                permissions
                    .create(CreatePermissionRecord {
                        tenant_id: tenant.id,
                        name: seed.name.clone(),
                        system_name: seed.system_name.clone(),
                        category: seed.category.clone(),
                    })
                    .await?
            }
        };
        if !record.is_granted_to(admin.id) {
            permissions
                .grant_to_role(tenant.id, admin.id, record.id)
                .await?;
        }
    }

    info!(permissions_created = created, "bootstrap complete");
    Ok(SeedReport {
        tenant_id: tenant.id,
        admin_role_id: admin.id,
        permissions_created: created,
    })
}
