//! Service wiring shared by request handlers.

use bastion_auth::AuthService;
use bastion_authz::PermissionService;
use bastion_cache::CacheStore;
use bastion_db::DbManager;
use bastion_db::repository::{
    SurrealPermissionRepository, SurrealRefreshTokenRepository,
    SurrealRolePermissionActionRepository, SurrealRoleRepository,
    SurrealUserPermissionActionRepository, SurrealUserRepository,
};
use surrealdb::engine::any::Any;

use crate::config::ServerConfig;

pub type Auth = AuthService<
    SurrealUserRepository<Any>,
    SurrealRoleRepository<Any>,
    SurrealRefreshTokenRepository<Any>,
>;

pub type Authz = PermissionService<
    SurrealPermissionRepository<Any>,
    SurrealRolePermissionActionRepository<Any>,
    SurrealUserPermissionActionRepository<Any>,
    SurrealRoleRepository<Any>,
>;

pub struct AppState {
    pub db: DbManager,
    pub cache: CacheStore,
    pub users: SurrealUserRepository<Any>,
    pub auth: Auth,
    pub authz: Authz,
}

impl AppState {
    pub fn new(db: DbManager, config: &ServerConfig) -> Self {
        let client = db.client().clone();
        let cache = CacheStore::new(&config.cache);
        let pepper = config.auth.pepper.clone();

        let auth = AuthService::new(
            SurrealUserRepository::with_pepper(client.clone(), pepper.clone()),
            SurrealRoleRepository::new(client.clone()),
            SurrealRefreshTokenRepository::new(client.clone()),
            config.auth.clone(),
        );
        let authz = PermissionService::new(
            SurrealPermissionRepository::new(client.clone()),
            SurrealRolePermissionActionRepository::new(client.clone()),
            SurrealUserPermissionActionRepository::new(client.clone()),
            SurrealRoleRepository::new(client.clone()),
            cache.clone(),
            &config.authorization,
        );

        Self {
            users: SurrealUserRepository::with_pepper(client, pepper),
            db,
            cache,
            auth,
            authz,
        }
    }
}
