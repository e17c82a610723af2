//! Request-scoped session binding.
//!
//! Every inbound request gets exactly one [`RequestScope`]: a write
//! transaction on the master connection when the request mutates state, and
//! always a read-only session derived from the replica connection. The scope
//! is finalized exactly once after downstream processing; the write handle is
//! unusable afterwards because `finalize` consumes it.

use std::sync::Arc;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{debug, warn};

use common::errors::AppError;
use models::db::DatabasePair;

/// Terminal result of a finalized scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Committed,
    RolledBack,
    /// The request never opened a write transaction.
    ReadOnly,
}

/// One database session pair bound to one request.
///
/// Cloning shares the same underlying write transaction; all clones must be
/// dropped before [`RequestScope::finalize`] runs on the last one, otherwise
/// the handle counts as leaked beyond the request lifetime.
#[derive(Clone)]
pub struct RequestScope {
    write: Option<Arc<DatabaseTransaction>>,
    read: DatabaseConnection,
}

impl RequestScope {
    /// Open the session pair for a request. `mutating` selects whether a
    /// write transaction is started on the master connection; a read-only
    /// session on the replica is bound either way.
    pub async fn begin(db: &DatabasePair, mutating: bool) -> Result<Self, AppError> {
        let write = if mutating {
            let txn = db
                .master()
                .begin()
                .await
                .map_err(|e| AppError::internal("failed to open write transaction").with_source(e))?;
            Some(Arc::new(txn))
        } else {
            None
        };
        debug!(mutating, "request scope opened");
        Ok(Self { write, read: db.replica().clone() })
    }

    /// The write transaction, or an internal error when the request was
    /// bound read-only (a mutating operation reached a non-mutating scope).
    pub fn write(&self) -> Result<&DatabaseTransaction, AppError> {
        self.write
            .as_deref()
            .ok_or_else(|| AppError::internal("no write transaction bound to this request"))
    }

    /// A cloned read-only session handle. Clones never observe uncommitted
    /// writes from the request's own transaction.
    pub fn read(&self) -> DatabaseConnection {
        self.read.clone()
    }

    pub fn has_write(&self) -> bool {
        self.write.is_some()
    }

    /// Commit or roll back the write transaction, exactly once.
    ///
    /// `failed` records whether any error was observed downstream; a failed
    /// request rolls back, a clean one commits. Consumes the scope, so a
    /// finalized handle can never be reused. A write handle still shared
    /// with another clone at this point has leaked past the request and is
    /// reported as an internal error (the transaction then rolls back on
    /// drop).
    pub async fn finalize(self, failed: bool) -> Result<Outcome, AppError> {
        let Some(write) = self.write else {
            debug!("read-only scope finalized");
            return Ok(Outcome::ReadOnly);
        };
        let txn = Arc::try_unwrap(write).map_err(|_| {
            AppError::internal("write transaction still referenced at finalize; handle leaked beyond request scope")
        })?;
        if failed {
            txn.rollback()
                .await
                .map_err(|e| AppError::internal("failed to roll back write transaction").with_source(e))?;
            warn!("request scope rolled back");
            Ok(Outcome::RolledBack)
        } else {
            txn.commit()
                .await
                .map_err(|e| AppError::internal("failed to commit write transaction").with_source(e))?;
            debug!("request scope committed");
            Ok(Outcome::Committed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};
    use uuid::Uuid;

    use crate::test_support::setup_test_db;

    fn tenant_model(suffix: &str) -> models::tenant::ActiveModel {
        let now = Utc::now().into();
        models::tenant::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("scope_tenant_{suffix}")),
            timezone: Set("UTC".to_string()),
            phone: Set(format!("+3120{}", &suffix[..8])),
            email: Set(format!("scope_{suffix}@example.com")),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    #[tokio::test]
    async fn commit_makes_writes_visible_to_fresh_read_scope() -> Result<()> {
        let db = setup_test_db().await?;
        let suffix = Uuid::new_v4().simple().to_string();

        let scope = RequestScope::begin(&db, true).await?;
        let created = tenant_model(&suffix).insert(scope.write()?).await?;
        assert_eq!(scope.finalize(false).await?, Outcome::Committed);

        let fresh = RequestScope::begin(&db, false).await?;
        let found = models::tenant::Entity::find_by_id(created.id).one(&fresh.read()).await?;
        assert!(found.is_some());
        assert_eq!(fresh.finalize(false).await?, Outcome::ReadOnly);
        Ok(())
    }

    #[tokio::test]
    async fn recorded_failure_rolls_back() -> Result<()> {
        let db = setup_test_db().await?;
        let suffix = Uuid::new_v4().simple().to_string();

        let scope = RequestScope::begin(&db, true).await?;
        let created = tenant_model(&suffix).insert(scope.write()?).await?;
        assert_eq!(scope.finalize(true).await?, Outcome::RolledBack);

        let fresh = RequestScope::begin(&db, false).await?;
        let found = models::tenant::Entity::find_by_id(created.id).one(&fresh.read()).await?;
        assert!(found.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn read_only_scope_has_no_write_handle() -> Result<()> {
        let db = setup_test_db().await?;
        let scope = RequestScope::begin(&db, false).await?;
        assert!(!scope.has_write());
        let err = scope.write().unwrap_err();
        assert_eq!(err.code(), common::errors::code::INTERNAL);
        assert_eq!(scope.finalize(false).await?, Outcome::ReadOnly);
        Ok(())
    }

    #[tokio::test]
    async fn leaked_write_handle_fails_finalize() -> Result<()> {
        let db = setup_test_db().await?;
        let scope = RequestScope::begin(&db, true).await?;
        let leaked = scope.clone();
        let err = scope.finalize(false).await.unwrap_err();
        assert_eq!(err.code(), common::errors::code::INTERNAL);
        drop(leaked);
        Ok(())
    }
}
