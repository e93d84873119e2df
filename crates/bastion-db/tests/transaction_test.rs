//! Integration tests for the commit-or-rollback wrapper.

use bastion_core::error::BastionError;
use bastion_core::models::tenant::CreateTenant;
use bastion_core::repository::{Pagination, TenantRepository};
use bastion_db::repository::SurrealTenantRepository;
use bastion_db::run_in_transaction;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    bastion_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn committed_statements_are_visible() {
    let db = setup().await;

    run_in_transaction(&db, |tx| {
        tx.statement("CREATE tenant SET name = $a_name, slug = $a_slug")
            .statement("CREATE tenant SET name = $b_name, slug = $b_slug")
            .bind("a_name", "Acme")
            .bind("a_slug", "acme")
            .bind("b_name", "Globex")
            .bind("b_slug", "globex");
        Ok(())
    })
    .await
    .unwrap();

    let tenants = SurrealTenantRepository::new(db)
        .list(Pagination::default())
        .await
        .unwrap();
    assert_eq!(tenants.total, 2);
}

#[tokio::test]
async fn failing_statement_cancels_the_whole_transaction() {
    let db = setup().await;

    // The second insert violates the unique slug index.
    let err = run_in_transaction(&db, |tx| {
        tx.statement("CREATE tenant SET name = 'Acme', slug = 'acme'")
            .statement("CREATE tenant SET name = 'Acme again', slug = 'acme'");
        Ok(())
    })
    .await
    .unwrap_err();

    assert!(matches!(err, BastionError::Transaction(_)));
    assert!(std::error::Error::source(&err).is_some());

    let tenants = SurrealTenantRepository::new(db)
        .list(Pagination::default())
        .await
        .unwrap();
    assert_eq!(tenants.total, 0, "no row may survive a cancelled transaction");
}

#[tokio::test]
async fn build_error_sends_nothing() {
    let db = setup().await;

    let err = run_in_transaction(&db, |tx| {
        tx.statement("CREATE tenant SET name = 'Acme', slug = 'acme'");
        Err(BastionError::validation("slug is reserved"))
    })
    .await
    .unwrap_err();

    match err {
        BastionError::Transaction(inner) => {
            assert!(inner.to_string().contains("slug is reserved"));
        }
        other => panic!("expected transaction error, got {other:?}"),
    }

    let repo = SurrealTenantRepository::new(db);
    assert!(repo.get_by_slug("acme").await.unwrap_err().is_not_found());

    // The repository still works after an aborted transaction.
    repo.create(CreateTenant {
        name: "Acme".into(),
        slug: "acme".into(),
    })
    .await
    .unwrap();
}
