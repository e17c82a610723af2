//! Tenant registration workflow.
//!
//! Builds the tenant aggregate (tenant + first account + issued
//! verification) through the validated factories, checks every
//! uniqueness-sensitive field concurrently, then persists the aggregate
//! inside the request's write transaction.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use common::errors::{code, AppError};

use crate::domain::{Account, AccountVerification, Tenant};
use crate::repository::Repository;
use crate::scope::RequestScope;
use crate::uniqueness::{UniquenessCheck, UniquenessValidator};

/// How long a fresh verification token stays valid.
const VERIFICATION_TTL_HOURS: i64 = 24;

/// Registration input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRegistration {
    pub tenant_name: String,
    pub timezone: String,
    pub phone: String,
    pub email: String,
    pub account_name: String,
    pub account_email: String,
    pub account_phone: String,
    pub password: String,
}

/// Registration business service independent of the web framework.
pub struct RegistrationService {
    validator: UniquenessValidator,
}

impl RegistrationService {
    pub fn new(validator: UniquenessValidator) -> Self {
        Self { validator }
    }

    /// Register a tenant together with its first account and a pending
    /// verification token. The caller's scope must be mutating; nothing is
    /// visible outside the request until its transaction commits.
    #[instrument(skip(self, scope, input), fields(email = %input.email, phone = %input.phone))]
    pub async fn register(&self, scope: &RequestScope, input: NewRegistration) -> Result<Tenant, AppError> {
        if input.password.len() < 8 {
            return Err(AppError::unprocessable("password too short (>=8)")
                .with_detail("password", "must be at least 8 characters"));
        }

        let mut tenant = Tenant::new(&input.tenant_name, &input.timezone, &input.phone, &input.email)?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(input.password.as_bytes(), &salt)
            .map_err(|e| AppError::internal("failed to hash password").with_source(e.to_string()))?
            .to_string();

        let mut account = Account::new(
            tenant.id(),
            &input.account_name,
            &input.account_email,
            &input.account_phone,
            &hash,
        )?;
        let verification = AccountVerification::issue(account.id(), Duration::hours(VERIFICATION_TTL_HOURS))?;
        account.attach_verification(verification);
        tenant.attach_account(account);

        let checks = vec![
            UniquenessCheck::from_count(
                "tenant_phone",
                Repository::<Tenant>::new().filter("phone = ?", [tenant.phone()]),
                scope,
            ),
            UniquenessCheck::from_count(
                "tenant_email",
                Repository::<Tenant>::new().filter("email = ?", [tenant.email()]),
                scope,
            ),
            UniquenessCheck::from_count(
                "account_phone",
                Repository::<Account>::new().filter("phone = ?", [input.account_phone.as_str()]),
                scope,
            ),
            UniquenessCheck::from_count(
                "account_email",
                Repository::<Account>::new().filter("email = ?", [input.account_email.as_str()]),
                scope,
            ),
        ];
        self.validator
            .validate(checks, "phone or email already registered")
            .await?;

        Repository::<Tenant>::new().persist(scope, &mut tenant).await?;
        info!(tenant_id = %tenant.id(), "tenant registered");
        Ok(tenant)
    }

    /// Confirm a verification token and activate its account.
    #[instrument(skip(self, scope, token))]
    pub async fn verify_account(&self, scope: &RequestScope, token: &str) -> Result<Account, AppError> {
        let mut verification = Repository::<AccountVerification>::new()
            .filter("token = ?", [token])
            .get_one(scope)
            .await?;
        verification.mark_verified(Utc::now().into())?;
        Repository::<AccountVerification>::new()
            .persist(scope, &mut verification)
            .await?;

        let mut account = Repository::<Account>::new()
            .filter("id = ?", [verification.account_id()])
            .get_one(scope)
            .await?;
        account.activate();
        account.attach_verification(verification);
        Repository::<Account>::new().persist(scope, &mut account).await?;
        info!(account_id = %account.id(), "account verified");
        Ok(account)
    }

    /// Tenant by id with its accounts loaded.
    pub async fn tenant_by_id(&self, scope: &RequestScope, id: Uuid) -> Result<Tenant, AppError> {
        Repository::<Tenant>::new()
            .filter("id = ?", [id])
            .preload("accounts")
            .get_one(scope)
            .await
    }

    /// One page of tenants plus the total tenant count.
    pub async fn list_tenants(
        &self,
        scope: &RequestScope,
        page: u64,
        size: u64,
    ) -> Result<(Vec<Tenant>, u64), AppError> {
        Repository::<Tenant>::new()
            .order_by_asc("created_at")
            .order_by_asc("id")
            .get_page(scope, page, size)
            .await
    }

    /// Account by id with its verification loaded.
    pub async fn account_by_id(&self, scope: &RequestScope, id: Uuid) -> Result<Account, AppError> {
        Repository::<Account>::new()
            .filter("id = ?", [id])
            .preload("verification")
            .get_one(scope)
            .await
    }

    /// Delete a tenant and everything registered under it.
    #[instrument(skip(self, scope))]
    pub async fn delete_tenant(&self, scope: &RequestScope, id: Uuid) -> Result<(), AppError> {
        Repository::<AccountVerification>::new()
            .filter("account_id IN (SELECT id FROM account WHERE tenant_id = ?)", [id])
            .delete(scope)
            .await?;
        Repository::<Account>::new()
            .filter("tenant_id = ?", [id])
            .delete(scope)
            .await?;
        let affected = Repository::<Tenant>::new().filter("id = ?", [id]).delete(scope).await?;
        if affected == 0 {
            return Err(AppError::not_found(code::TENANT_NOT_FOUND, "tenant not found"));
        }
        info!(tenant_id = %id, "tenant deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use common::errors::ErrorKind;

    use crate::domain::AccountStatus;
    use crate::test_support::setup_test_db;

    fn input(tag: u32) -> NewRegistration {
        NewRegistration {
            tenant_name: format!("acme-{tag}"),
            timezone: "Europe/Berlin".to_string(),
            phone: format!("+100000{tag:04}"),
            email: format!("tenant{tag}@x.com"),
            account_name: format!("Owner {tag}"),
            account_email: format!("owner{tag}@x.com"),
            account_phone: format!("+200000{tag:04}"),
            password: "correct-horse".to_string(),
        }
    }

    fn service() -> RegistrationService {
        RegistrationService::new(UniquenessValidator::new())
    }

    #[tokio::test]
    async fn register_persists_the_whole_aggregate() -> Result<()> {
        let db = setup_test_db().await?;
        let svc = service();

        let scope = RequestScope::begin(&db, true).await?;
        let tenant = svc.register(&scope, input(1)).await?;
        scope.finalize(false).await?;

        let fresh = RequestScope::begin(&db, false).await?;
        let loaded = svc.tenant_by_id(&fresh, tenant.id()).await?;
        assert_eq!(loaded.name(), "acme-1");
        assert_eq!(loaded.accounts().len(), 1);
        let account = &loaded.accounts()[0];
        assert_eq!(account.status(), AccountStatus::Pending);
        assert_ne!(account.password_hash(), "correct-horse");

        let verification = Repository::<AccountVerification>::new()
            .filter("account_id = ?", [account.id()])
            .get_one(&fresh)
            .await?;
        assert!(!verification.is_verified());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_phone_conflicts_and_leaves_no_rows() -> Result<()> {
        let db = setup_test_db().await?;
        let svc = service();

        let scope = RequestScope::begin(&db, true).await?;
        svc.register(&scope, input(2)).await?;
        scope.finalize(false).await?;

        // Same tenant phone, fresh everything else.
        let mut duplicate = input(3);
        duplicate.phone = input(2).phone;

        let scope = RequestScope::begin(&db, true).await?;
        let err = svc.register(&scope, duplicate).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        scope.finalize(true).await?;

        let fresh = RequestScope::begin(&db, false).await?;
        let total = Repository::<Tenant>::new().count(&fresh).await?;
        assert_eq!(total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn register_rolls_back_when_request_fails_later() -> Result<()> {
        let db = setup_test_db().await?;
        let svc = service();

        let scope = RequestScope::begin(&db, true).await?;
        let tenant = svc.register(&scope, input(4)).await?;
        // Some later handler step fails; the coordinator rolls back.
        scope.finalize(true).await?;

        let fresh = RequestScope::begin(&db, false).await?;
        let err = svc.tenant_by_id(&fresh, tenant.id()).await.unwrap_err();
        assert_eq!(err.code(), code::TENANT_NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn short_password_is_unprocessable() -> Result<()> {
        let db = setup_test_db().await?;
        let svc = service();

        let mut bad = input(5);
        bad.password = "short".to_string();

        let scope = RequestScope::begin(&db, true).await?;
        let err = svc.register(&scope, bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnprocessableEntity);
        scope.finalize(true).await?;
        Ok(())
    }

    #[tokio::test]
    async fn verify_account_activates_it() -> Result<()> {
        let db = setup_test_db().await?;
        let svc = service();

        let scope = RequestScope::begin(&db, true).await?;
        let tenant = svc.register(&scope, input(6)).await?;
        scope.finalize(false).await?;
        let token = tenant.accounts()[0]
            .verification()
            .expect("registration issues a verification")
            .token()
            .to_string();

        let scope = RequestScope::begin(&db, true).await?;
        let account = svc.verify_account(&scope, &token).await?;
        assert_eq!(account.status(), AccountStatus::Active);
        scope.finalize(false).await?;

        let fresh = RequestScope::begin(&db, false).await?;
        let reloaded = svc.account_by_id(&fresh, account.id()).await?;
        assert_eq!(reloaded.status(), AccountStatus::Active);
        assert!(reloaded.verification().expect("verification row").is_verified());

        // A second confirmation attempt is rejected.
        let scope = RequestScope::begin(&db, true).await?;
        let err = svc.verify_account(&scope, &token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnprocessableEntity);
        scope.finalize(true).await?;
        Ok(())
    }

    #[tokio::test]
    async fn unknown_token_is_verification_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let svc = service();

        let scope = RequestScope::begin(&db, true).await?;
        let err = svc.verify_account(&scope, "no-such-token").await.unwrap_err();
        assert_eq!(err.code(), code::VERIFICATION_NOT_FOUND);
        scope.finalize(true).await?;
        Ok(())
    }

    #[tokio::test]
    async fn delete_tenant_removes_the_aggregate() -> Result<()> {
        let db = setup_test_db().await?;
        let svc = service();

        let scope = RequestScope::begin(&db, true).await?;
        let tenant = svc.register(&scope, input(7)).await?;
        scope.finalize(false).await?;

        let scope = RequestScope::begin(&db, true).await?;
        svc.delete_tenant(&scope, tenant.id()).await?;
        scope.finalize(false).await?;

        let fresh = RequestScope::begin(&db, false).await?;
        assert_eq!(Repository::<Tenant>::new().count(&fresh).await?, 0);
        assert_eq!(Repository::<Account>::new().count(&fresh).await?, 0);
        assert_eq!(Repository::<AccountVerification>::new().count(&fresh).await?, 0);

        let scope = RequestScope::begin(&db, true).await?;
        let err = svc.delete_tenant(&scope, tenant.id()).await.unwrap_err();
        assert_eq!(err.code(), code::TENANT_NOT_FOUND);
        scope.finalize(true).await?;
        Ok(())
    }

    #[tokio::test]
    async fn listing_paginates_registered_tenants() -> Result<()> {
        let db = setup_test_db().await?;
        let svc = service();

        for tag in 10..13 {
            let scope = RequestScope::begin(&db, true).await?;
            svc.register(&scope, input(tag)).await?;
            scope.finalize(false).await?;
        }

        let fresh = RequestScope::begin(&db, false).await?;
        let (page, total) = svc.list_tenants(&fresh, 1, 2).await?;
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        let (rest, total) = svc.list_tenants(&fresh, 2, 2).await?;
        assert_eq!(total, 3);
        assert_eq!(rest.len(), 1);
        Ok(())
    }
}
