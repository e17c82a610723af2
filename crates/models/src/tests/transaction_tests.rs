use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use uuid::Uuid;

use super::setup_test_db;
use crate::tenant;

fn tenant_model(name: &str, phone: &str, email: &str) -> tenant::ActiveModel {
    let now = Utc::now().into();
    tenant::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        timezone: Set("UTC".to_string()),
        phone: Set(phone.to_string()),
        email: Set(email.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

/// Test basic transaction commit
#[tokio::test]
async fn test_transaction_commit() -> Result<()> {
    let db = setup_test_db().await?;

    let suffix = Uuid::new_v4().simple().to_string();
    let tenant_name = format!("tx_commit_test_{suffix}");

    let txn = db.master().begin().await?;
    let created = tenant_model(
        &tenant_name,
        &format!("+3110{}", &suffix[..8]),
        &format!("commit_{suffix}@example.com"),
    )
    .insert(&txn)
    .await?;
    txn.commit().await?;

    // Visible through the replica after commit
    let found = tenant::Entity::find_by_id(created.id).one(db.replica()).await?;
    assert!(found.is_some());
    assert_eq!(found.unwrap().name, tenant_name);

    Ok(())
}

/// Test transaction rollback
#[tokio::test]
async fn test_transaction_rollback() -> Result<()> {
    let db = setup_test_db().await?;

    let suffix = Uuid::new_v4().simple().to_string();
    let tenant_name = format!("tx_rollback_test_{suffix}");

    let txn = db.master().begin().await?;
    let created = tenant_model(
        &tenant_name,
        &format!("+3111{}", &suffix[..8]),
        &format!("rollback_{suffix}@example.com"),
    )
    .insert(&txn)
    .await?;
    txn.rollback().await?;

    // Not visible after rollback, neither by id nor by name
    let found = tenant::Entity::find_by_id(created.id).one(db.replica()).await?;
    assert!(found.is_none());

    let by_name = tenant::Entity::find()
        .filter(tenant::Column::Name.eq(tenant_name))
        .one(db.replica())
        .await?;
    assert!(by_name.is_none());

    Ok(())
}

/// Test transaction with error handling: a unique-constraint violation
/// inside the transaction leaves nothing behind once rolled back.
#[tokio::test]
async fn test_transaction_error_handling() -> Result<()> {
    let db = setup_test_db().await?;

    let suffix = Uuid::new_v4().simple().to_string();
    let phone = format!("+3112{}", &suffix[..8]);

    let txn = db.master().begin().await?;
    tenant_model(
        &format!("tx_error_a_{suffix}"),
        &phone,
        &format!("error_a_{suffix}@example.com"),
    )
    .insert(&txn)
    .await?;
    // Duplicate phone violates the unique index
    let duplicate = tenant_model(
        &format!("tx_error_b_{suffix}"),
        &phone,
        &format!("error_b_{suffix}@example.com"),
    )
    .insert(&txn)
    .await;
    assert!(duplicate.is_err());
    txn.rollback().await?;

    let found = tenant::Entity::find()
        .filter(tenant::Column::Phone.eq(phone))
        .one(db.replica())
        .await?;
    assert!(found.is_none());

    Ok(())
}
