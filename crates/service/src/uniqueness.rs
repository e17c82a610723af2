//! Concurrent multi-field uniqueness validation.
//!
//! Before an aggregate with several uniqueness-sensitive fields is
//! persisted, every field is checked for pre-existing rows in parallel. The
//! checks run before any mutation in the request's write transaction, each
//! against its own cloned read session bound to the same request, so they
//! are safe to fan out.

use std::future::Future;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use common::errors::AppError;

use crate::repository::{AggregateMapping, Repository};
use crate::scope::RequestScope;

/// One named existence check: a count of rows that would conflict.
pub struct UniquenessCheck {
    name: &'static str,
    count: BoxFuture<'static, Result<u64, AppError>>,
}

impl UniquenessCheck {
    pub fn new(
        name: &'static str,
        count: impl Future<Output = Result<u64, AppError>> + Send + 'static,
    ) -> Self {
        Self { name, count: Box::pin(count) }
    }

    /// Check built from a repository condition chain; counts matching rows
    /// through the given request scope.
    pub fn from_count<A>(name: &'static str, repository: Repository<A>, scope: &RequestScope) -> Self
    where
        A: AggregateMapping + 'static,
        <A::Store as sea_orm::EntityTrait>::Model: Send + Sync,
    {
        let scope = scope.clone();
        Self::new(name, async move { repository.count(&scope).await })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Runs independent uniqueness checks concurrently and aggregates the
/// outcome. Constructed explicitly and passed in wherever needed; there is
/// no global instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniquenessValidator;

impl UniquenessValidator {
    pub fn new() -> Self {
        Self
    }

    /// Drive all checks concurrently and fail fast on the first observed
    /// terminal condition:
    ///
    /// - the first check completing with an error aborts the rest and
    ///   surfaces one wrapped internal error;
    /// - the first check reporting a positive count aborts the rest and
    ///   surfaces one conflict error carrying `conflict_message`;
    /// - only when every check completes with a zero count does validation
    ///   succeed.
    ///
    /// No decision ever waits on still-pending checks; dropping the pending
    /// set cancels them.
    pub async fn validate(
        &self,
        checks: Vec<UniquenessCheck>,
        conflict_message: &str,
    ) -> Result<(), AppError> {
        let mut pending: FuturesUnordered<_> = checks
            .into_iter()
            .map(|check| async move { (check.name, check.count.await) })
            .collect();
        while let Some((name, result)) = pending.next().await {
            let count = result.map_err(|e| {
                AppError::internal(format!("uniqueness check `{name}` failed")).with_source(e)
            })?;
            if count > 0 {
                warn!(check = name, count, "uniqueness conflict detected");
                return Err(AppError::conflict(conflict_message));
            }
            debug!(check = name, "uniqueness check clean");
        }
        Ok(())
    }
}
