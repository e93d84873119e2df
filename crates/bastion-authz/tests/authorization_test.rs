//! Integration tests for the permission authorization engine over
//! in-memory SurrealDB.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bastion_authz::cache_keys;
use bastion_authz::{AuthorizationConfig, PermissionService};
use bastion_cache::{CacheConfig, CacheStore};
use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::permission::{
    CreatePermissionAction, CreatePermissionRecord, CreateRolePermissionAction,
    PermissionAction, PermissionRecord, SetUserPermissionAction, UpdatePermissionAction,
    UpdatePermissionRecord,
};
use bastion_core::models::role::{CreateRole, Role, UpdateRole};
use bastion_core::models::tenant::CreateTenant;
use bastion_core::models::user::{CreateUser, User};
use bastion_core::principal::CurrentUserProvider;
use bastion_core::repository::{
    PaginatedResult, Pagination, PermissionRepository, RoleRepository, TenantRepository,
    UserRepository,
};
use bastion_db::repository::{
    SurrealPermissionRepository, SurrealRolePermissionActionRepository, SurrealRoleRepository,
    SurrealTenantRepository, SurrealUserPermissionActionRepository, SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Current-user provider pinned to a fixed user (or none).
struct AsUser(Option<User>);

impl CurrentUserProvider for AsUser {
    async fn current_user(&self) -> BastionResult<Option<User>> {
        Ok(self.0.clone())
    }
}

/// Permission repository that counts system-name lookups.
#[derive(Clone)]
struct CountingPermissions {
    inner: SurrealPermissionRepository<Db>,
    lookups: Arc<AtomicUsize>,
}

impl CountingPermissions {
    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl PermissionRepository for CountingPermissions {
    async fn create(&self, input: CreatePermissionRecord) -> BastionResult<PermissionRecord> {
        self.inner.create(input).await
    }
    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<PermissionRecord> {
        self.inner.get_by_id(tenant_id, id).await
    }
    async fn find_by_system_name(
        &self,
        tenant_id: Uuid,
        system_name: &str,
    ) -> BastionResult<Option<PermissionRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_system_name(tenant_id, system_name).await
    }
    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePermissionRecord,
    ) -> BastionResult<PermissionRecord> {
        self.inner.update(tenant_id, id, input).await
    }
    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        self.inner.delete(tenant_id, id).await
    }
    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> BastionResult<PaginatedResult<PermissionRecord>> {
        self.inner.list(tenant_id, pagination).await
    }
    async fn list_by_category(
        &self,
        tenant_id: Uuid,
        category: &str,
    ) -> BastionResult<Vec<PermissionRecord>> {
        self.inner.list_by_category(tenant_id, category).await
    }
    async fn grant_to_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> BastionResult<()> {
        self.inner
            .grant_to_role(tenant_id, role_id, permission_id)
            .await
    }
    async fn revoke_from_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> BastionResult<()> {
        self.inner
            .revoke_from_role(tenant_id, role_id, permission_id)
            .await
    }
    async fn get_role_permissions(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
    ) -> BastionResult<Vec<PermissionRecord>> {
        self.inner.get_role_permissions(tenant_id, role_id).await
    }
    async fn create_action(&self, input: CreatePermissionAction) -> BastionResult<PermissionAction> {
        self.inner.create_action(input).await
    }
    async fn get_action(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<PermissionAction> {
        self.inner.get_action(tenant_id, id).await
    }
    async fn update_action(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePermissionAction,
    ) -> BastionResult<PermissionAction> {
        self.inner.update_action(tenant_id, id, input).await
    }
    async fn delete_action(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        self.inner.delete_action(tenant_id, id).await
    }
    async fn list_actions(
        &self,
        tenant_id: Uuid,
        permission_record_id: Uuid,
    ) -> BastionResult<Vec<PermissionAction>> {
        self.inner.list_actions(tenant_id, permission_record_id).await
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

type Service = PermissionService<
    CountingPermissions,
    SurrealRolePermissionActionRepository<Db>,
    SurrealUserPermissionActionRepository<Db>,
    SurrealRoleRepository<Db>,
>;

/// Tenant with user "alice" holding role "Editor", which is granted the
/// "Articles" permission. "Articles" has a "Publish" action.
struct Fixture {
    db: Surreal<Db>,
    tenant_id: Uuid,
    alice: User,
    editor: Role,
    articles: PermissionRecord,
    publish: PermissionAction,
    permissions: CountingPermissions,
    service: Service,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    bastion_db::run_migrations(&db).await.unwrap();

    let tenant_id = SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: "Newsroom".into(),
            slug: "newsroom".into(),
        })
        .await
        .unwrap()
        .id;

    let alice = create_user(&db, tenant_id, "alice").await;

    let roles = SurrealRoleRepository::new(db.clone());
    let editor = roles
        .create(CreateRole {
            tenant_id,
            name: "Editor".into(),
            description: String::new(),
            is_active: true,
        })
        .await
        .unwrap();
    roles
        .assign_to_user(tenant_id, alice.id, editor.id)
        .await
        .unwrap();

    let permissions = CountingPermissions {
        inner: SurrealPermissionRepository::new(db.clone()),
        lookups: Arc::new(AtomicUsize::new(0)),
    };
    let service = PermissionService::new(
        permissions.clone(),
        SurrealRolePermissionActionRepository::new(db.clone()),
        SurrealUserPermissionActionRepository::new(db.clone()),
        roles,
        CacheStore::new(&CacheConfig::default()),
        &AuthorizationConfig::default(),
    );

    let articles = service
        .create_record(CreatePermissionRecord {
            tenant_id,
            name: "Manage articles".into(),
            system_name: "Articles".into(),
            category: "Content".into(),
        })
        .await
        .unwrap();
    let publish = service
        .create_action(CreatePermissionAction {
            tenant_id,
            permission_record_id: articles.id,
            name: "Publish".into(),
            system_name: "articles.publish".into(),
        })
        .await
        .unwrap();
    service
        .grant_to_role(tenant_id, editor.id, articles.id)
        .await
        .unwrap();

    Fixture {
        db,
        tenant_id,
        alice,
        editor,
        articles,
        publish,
        permissions,
        service,
    }
}

async fn create_user(db: &Surreal<Db>, tenant_id: Uuid, username: &str) -> User {
    SurrealUserRepository::new(db.clone())
        .create(CreateUser {
            tenant_id,
            username: username.into(),
            email: format!("{username}@example.com"),
            display_name: String::new(),
            avatar: None,
            password: "secret".into(),
        })
        .await
        .unwrap()
}

impl Fixture {
    fn as_alice(&self) -> AsUser {
        AsUser(Some(self.alice.clone()))
    }

    async fn revoke_publish_for_editor(&self) {
        self.service
            .add_role_action(CreateRolePermissionAction {
                tenant_id: self.tenant_id,
                role_id: self.editor.id,
                permission_action_id: self.publish.id,
            })
            .await
            .unwrap();
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn editor_may_publish_articles_until_action_row_is_added() {
    let f = setup().await;
    let alice = f.as_alice();

    assert!(f.service.authorize("Articles", &alice).await.unwrap());
    assert!(
        f.service
            .authorize_action("Articles", "Publish", &alice)
            .await
            .unwrap()
    );

    f.revoke_publish_for_editor().await;

    assert!(
        !f.service
            .authorize_action("Articles", "Publish", &alice)
            .await
            .unwrap()
    );
    assert!(f.service.authorize("Articles", &alice).await.unwrap());
}

#[tokio::test]
async fn action_rows_only_deny_the_named_action() {
    let f = setup().await;
    let alice = f.as_alice();
    f.service
        .create_action(CreatePermissionAction {
            tenant_id: f.tenant_id,
            permission_record_id: f.articles.id,
            name: "Delete".into(),
            system_name: "articles.delete".into(),
        })
        .await
        .unwrap();
    f.revoke_publish_for_editor().await;

    assert!(
        f.service
            .authorize_action("Articles", "Delete", &alice)
            .await
            .unwrap()
    );
    assert!(
        !f.service
            .authorize_action("Articles", "Publish", &alice)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn action_requires_the_base_permission() {
    let f = setup().await;
    f.service
        .revoke_from_role(f.tenant_id, f.editor.id, f.articles.id)
        .await
        .unwrap();

    assert!(
        !f.service
            .authorize_action("Articles", "Publish", &f.as_alice())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn user_without_roles_is_denied() {
    let f = setup().await;
    let bob = create_user(&f.db, f.tenant_id, "bob").await;

    assert!(
        !f.service
            .authorize("Articles", &AsUser(Some(bob)))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn inactive_role_grants_nothing() {
    let f = setup().await;
    SurrealRoleRepository::new(f.db.clone())
        .update(
            f.tenant_id,
            f.editor.id,
            UpdateRole {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!f.service.authorize("Articles", &f.as_alice()).await.unwrap());
}

#[tokio::test]
async fn missing_user_name_or_record_is_denied() {
    let f = setup().await;

    assert!(!f.service.authorize("Articles", &AsUser(None)).await.unwrap());
    assert!(!f.service.authorize("", &f.as_alice()).await.unwrap());
    assert!(!f.service.authorize("Unknown", &f.as_alice()).await.unwrap());
    assert!(
        !f.service
            .authorize_action("Articles", "", &f.as_alice())
            .await
            .unwrap()
    );
    assert!(
        !f.service
            .authorize_role("Unknown", &f.editor)
            .await
            .unwrap()
    );
}

// ---------------------------------------------------------------------------
// Caching
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cached_decision_skips_the_repository() {
    let f = setup().await;
    let alice = f.as_alice();

    assert!(f.service.authorize("Articles", &alice).await.unwrap());
    let after_first = f.permissions.lookups();
    assert_eq!(after_first, 1);

    assert!(f.service.authorize("Articles", &alice).await.unwrap());
    assert!(f.service.authorize_role("Articles", &f.editor).await.unwrap());
    assert_eq!(f.permissions.lookups(), after_first);
    assert!(
        f.service
            .cache()
            .contains_key(&cache_keys::role_allowed(f.editor.id, "Articles"))
    );
}

#[tokio::test]
async fn stale_until_a_mutation_flushes_the_prefix() {
    let f = setup().await;
    let alice = f.as_alice();
    assert!(f.service.authorize("Articles", &alice).await.unwrap());

    // Writes that bypass the service leave the cached decision in place.
    SurrealPermissionRepository::new(f.db.clone())
        .revoke_from_role(f.tenant_id, f.editor.id, f.articles.id)
        .await
        .unwrap();
    assert!(f.service.authorize("Articles", &alice).await.unwrap());

    f.service
        .update_record(
            f.tenant_id,
            f.articles.id,
            UpdatePermissionRecord {
                category: Some("Editorial".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(
        !f.service
            .cache()
            .contains_key(&cache_keys::role_allowed(f.editor.id, "Articles"))
    );
    assert!(!f.service.authorize("Articles", &alice).await.unwrap());
}

#[tokio::test]
async fn unrelated_keys_survive_the_flush() {
    let f = setup().await;
    f.service
        .cache()
        .set_default("sessions.alice", &true)
        .await
        .unwrap();

    f.revoke_publish_for_editor().await;

    assert!(f.service.cache().contains_key("sessions.alice"));
}

// ---------------------------------------------------------------------------
// User overrides
// ---------------------------------------------------------------------------

#[tokio::test]
async fn user_override_decides_before_roles() {
    let f = setup().await;
    let alice = f.as_alice();

    // No override: falls back to the role check.
    assert!(
        f.service
            .authorize_user_action("Articles", "Publish", &alice)
            .await
            .unwrap()
    );

    let row = f
        .service
        .set_user_action(SetUserPermissionAction {
            tenant_id: f.tenant_id,
            user_id: f.alice.id,
            permission_action_id: f.publish.id,
            is_allowed: false,
        })
        .await
        .unwrap();
    assert!(
        !f.service
            .authorize_user_action("Articles", "Publish", &alice)
            .await
            .unwrap()
    );
    assert!(
        f.service
            .authorize_action("Articles", "Publish", &alice)
            .await
            .unwrap()
    );

    f.revoke_publish_for_editor().await;
    f.service
        .set_user_action(SetUserPermissionAction {
            tenant_id: f.tenant_id,
            user_id: f.alice.id,
            permission_action_id: f.publish.id,
            is_allowed: true,
        })
        .await
        .unwrap();
    assert!(
        f.service
            .authorize_user_action("Articles", "Publish", &alice)
            .await
            .unwrap()
    );

    f.service
        .remove_user_action(f.tenant_id, row.id)
        .await
        .unwrap();
    assert!(
        !f.service
            .authorize_user_action("Articles", "Publish", &alice)
            .await
            .unwrap()
    );
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_arguments_are_rejected() {
    let f = setup().await;

    let err = f
        .service
        .create_record(CreatePermissionRecord {
            tenant_id: f.tenant_id,
            name: "Nameless".into(),
            system_name: "  ".into(),
            category: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BastionError::Validation { .. }));

    let err = f
        .service
        .update_action(
            f.tenant_id,
            f.publish.id,
            UpdatePermissionAction {
                name: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BastionError::Validation { .. }));

    let err = f
        .service
        .grant_to_role(f.tenant_id, Uuid::nil(), f.articles.id)
        .await
        .unwrap_err();
    assert!(matches!(err, BastionError::Validation { .. }));
}

#[tokio::test]
async fn deleting_the_record_denies_everyone() {
    let f = setup().await;
    let alice = f.as_alice();
    assert!(f.service.authorize("Articles", &alice).await.unwrap());

    f.service
        .delete_record(f.tenant_id, f.articles.id)
        .await
        .unwrap();

    assert!(!f.service.authorize("Articles", &alice).await.unwrap());
}
