//! Integration tests for tenant, user and role repositories using
//! in-memory SurrealDB.

use bastion_core::error::BastionError;
use bastion_core::models::role::{CreateRole, UpdateRole};
use bastion_core::models::tenant::{CreateTenant, UpdateTenant};
use bastion_core::models::user::{CreateUser, UpdateUser, UserStatus};
use bastion_core::repository::{Pagination, RoleRepository, TenantRepository, UserRepository};
use bastion_db::repository::{
    SurrealRoleRepository, SurrealTenantRepository, SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> (Surreal<Db>, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    bastion_db::run_migrations(&db).await.unwrap();

    let tenant = SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: "Test Tenant".into(),
            slug: "test-tenant".into(),
        })
        .await
        .unwrap();

    (db, tenant.id)
}

fn new_user(tenant_id: Uuid, username: &str) -> CreateUser {
    CreateUser {
        tenant_id,
        username: username.into(),
        email: format!("{username}@example.com"),
        display_name: String::new(),
        avatar: None,
        password: "correct horse".into(),
    }
}

// ---------------------------------------------------------------------------
// Tenants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tenant_crud() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let by_slug = repo.get_by_slug("test-tenant").await.unwrap();
    assert_eq!(by_slug.id, tenant_id);

    let updated = repo
        .update(
            tenant_id,
            UpdateTenant {
                name: Some("Renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.slug, "test-tenant");

    repo.delete(tenant_id).await.unwrap();
    assert!(repo.get_by_id(tenant_id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn duplicate_tenant_slug_is_rejected() {
    let (db, _) = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let err = repo
        .create(CreateTenant {
            name: "Other".into(),
            slug: "test-tenant".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BastionError::AlreadyExists { .. }));
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_user_hashes_password_and_defaults_display_name() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo.create(new_user(tenant_id, "alice")).await.unwrap();

    assert_eq!(user.tenant_id, tenant_id);
    assert_eq!(user.display_name, "alice");
    assert_eq!(user.status, UserStatus::Active);
    assert!(user.password_hash.starts_with("$argon2id$"));
    assert_ne!(user.password_hash, "correct horse");

    let by_name = repo.get_by_username(tenant_id, "alice").await.unwrap();
    let by_email = repo
        .get_by_email(tenant_id, "alice@example.com")
        .await
        .unwrap();
    assert_eq!(by_name.id, user.id);
    assert_eq!(by_email.id, user.id);
}

#[tokio::test]
async fn users_are_tenant_scoped() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo.create(new_user(tenant_id, "alice")).await.unwrap();

    let other_tenant = Uuid::new_v4();
    assert!(
        repo.get_by_id(other_tenant, user.id)
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn update_and_soft_delete_user() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo.create(new_user(tenant_id, "alice")).await.unwrap();

    let updated = repo
        .update(
            tenant_id,
            user.id,
            UpdateUser {
                display_name: Some("Alice Liddell".into()),
                avatar: Some(Some("avatars/alice.png".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.display_name, "Alice Liddell");
    assert_eq!(updated.avatar.as_deref(), Some("avatars/alice.png"));

    let cleared = repo
        .update(
            tenant_id,
            user.id,
            UpdateUser {
                avatar: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.avatar, None);

    repo.delete(tenant_id, user.id).await.unwrap();
    let deleted = repo.get_by_id(tenant_id, user.id).await.unwrap();
    assert_eq!(deleted.status, UserStatus::Inactive);
}

#[tokio::test]
async fn list_users_with_pagination() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    for name in ["alice", "bob", "carol"] {
        repo.create(new_user(tenant_id, name)).await.unwrap();
    }

    let page = repo
        .list(
            tenant_id,
            Pagination {
                offset: 0,
                limit: 2,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn role_crud_and_lookup_by_name() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealRoleRepository::new(db);

    let role = repo
        .create(CreateRole {
            tenant_id,
            name: "Editor".into(),
            description: "Edits articles".into(),
            is_active: true,
        })
        .await
        .unwrap();

    let found = repo.get_by_name(tenant_id, "Editor").await.unwrap();
    assert_eq!(found.map(|r| r.id), Some(role.id));
    assert!(repo.get_by_name(tenant_id, "Ghost").await.unwrap().is_none());

    let updated = repo
        .update(
            tenant_id,
            role.id,
            UpdateRole {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.is_active);
    assert_eq!(updated.description, "Edits articles");

    repo.delete(tenant_id, role.id).await.unwrap();
    assert!(
        repo.get_by_id(tenant_id, role.id)
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn assign_and_unassign_roles() {
    let (db, tenant_id) = setup().await;
    let users = SurrealUserRepository::new(db.clone());
    let roles = SurrealRoleRepository::new(db);

    let alice = users.create(new_user(tenant_id, "alice")).await.unwrap();
    let editor = roles
        .create(CreateRole {
            tenant_id,
            name: "Editor".into(),
            description: String::new(),
            is_active: true,
        })
        .await
        .unwrap();
    let viewer = roles
        .create(CreateRole {
            tenant_id,
            name: "Viewer".into(),
            description: String::new(),
            is_active: true,
        })
        .await
        .unwrap();

    assert!(roles.get_user_roles(tenant_id, alice.id).await.unwrap().is_empty());

    roles.assign_to_user(tenant_id, alice.id, editor.id).await.unwrap();
    roles.assign_to_user(tenant_id, alice.id, editor.id).await.unwrap();
    roles.assign_to_user(tenant_id, alice.id, viewer.id).await.unwrap();

    let assigned = roles.get_user_roles(tenant_id, alice.id).await.unwrap();
    let names: Vec<&str> = assigned.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["Editor", "Viewer"]);

    roles
        .unassign_from_user(tenant_id, alice.id, editor.id)
        .await
        .unwrap();
    let assigned = roles.get_user_roles(tenant_id, alice.id).await.unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].id, viewer.id);
}

#[tokio::test]
async fn assigning_to_unknown_user_fails() {
    let (db, tenant_id) = setup().await;
    let roles = SurrealRoleRepository::new(db);

    let role = roles
        .create(CreateRole {
            tenant_id,
            name: "Editor".into(),
            description: String::new(),
            is_active: true,
        })
        .await
        .unwrap();

    let err = roles
        .assign_to_user(tenant_id, Uuid::new_v4(), role.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
