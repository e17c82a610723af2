use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use common::errors::{code, AppError};

use super::verification::AccountVerification;
use super::{validate_email, validate_name, validate_phone};
use crate::repository::{self, AggregateMapping, NotFoundKind, TryIntoEntity};

/// Lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    /// Created but not yet verified.
    Pending,
    /// Verification completed.
    Active,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Active => "active",
        }
    }

    pub(crate) fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "pending" => Ok(AccountStatus::Pending),
            "active" => Ok(AccountStatus::Active),
            other => Err(AppError::unprocessable("invalid account status")
                .with_detail("status", other)),
        }
    }
}

/// Account aggregate; owns its pending verification when one is populated.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    email: String,
    phone: String,
    password_hash: String,
    status: AccountStatus,
    verification: Option<AccountVerification>,
    created_at: DateTimeWithTimeZone,
    updated_at: DateTimeWithTimeZone,
}

impl Account {
    /// Validated factory. The password hash is opaque here; hashing is the
    /// caller's concern.
    pub fn new(
        tenant_id: Uuid,
        name: &str,
        email: &str,
        phone: &str,
        password_hash: &str,
    ) -> Result<Self, AppError> {
        validate_name(name)?;
        validate_email(email)?;
        validate_phone(phone)?;
        if password_hash.trim().is_empty() {
            return Err(AppError::unprocessable("missing password hash")
                .with_detail("password_hash", "must not be empty"));
        }
        let now = Utc::now().into();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            password_hash: password_hash.to_string(),
            status: AccountStatus::Pending,
            verification: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    pub fn verification(&self) -> Option<&AccountVerification> {
        self.verification.as_ref()
    }

    pub fn created_at(&self) -> DateTimeWithTimeZone {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTimeWithTimeZone {
        self.updated_at
    }

    /// Attach a verification to be persisted with the account.
    pub fn attach_verification(&mut self, verification: AccountVerification) {
        self.verification = Some(verification);
    }

    /// Move a pending account to active.
    pub fn activate(&mut self) {
        self.status = AccountStatus::Active;
        self.updated_at = Utc::now().into();
    }

    /// Rebuild from a stored row, re-running field validation.
    pub(crate) fn from_model(model: models::account::Model) -> Result<Self, AppError> {
        let mut account = Self::new(
            model.tenant_id,
            &model.name,
            &model.email,
            &model.phone,
            &model.password_hash,
        )
        .map_err(|e| AppError::internal("stored account row failed domain validation").with_source(e))?;
        account.id = model.id;
        account.status = AccountStatus::parse(&model.status)
            .map_err(|e| AppError::internal("stored account row failed domain validation").with_source(e))?;
        account.created_at = model.created_at;
        account.updated_at = model.updated_at;
        Ok(account)
    }
}

#[async_trait]
impl AggregateMapping for Account {
    type Store = models::account::Entity;
    type Active = models::account::ActiveModel;

    fn to_model(&self) -> models::account::ActiveModel {
        models::account::ActiveModel {
            id: Set(self.id),
            tenant_id: Set(self.tenant_id),
            name: Set(self.name.clone()),
            email: Set(self.email.clone()),
            phone: Set(self.phone.clone()),
            password_hash: Set(self.password_hash.clone()),
            status: Set(self.status.as_str().to_string()),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
        }
    }

    fn absorb(&mut self, saved: models::account::Model) -> Result<(), AppError> {
        let verification = self.verification.take();
        *self = Self::from_model(saved)?;
        self.verification = verification;
        Ok(())
    }

    async fn save_associations(&self, txn: &DatabaseTransaction) -> Result<(), AppError> {
        if let Some(verification) = &self.verification {
            repository::upsert(verification.to_model(), txn).await?;
        }
        Ok(())
    }

    async fn load_association(&mut self, name: &str, read: &DatabaseConnection) -> Result<(), AppError> {
        match name {
            "verification" => {
                let row = models::account_verification::Entity::find()
                    .filter(models::account_verification::Column::AccountId.eq(self.id))
                    .one(read)
                    .await
                    .map_err(|e| AppError::internal("failed to load account verification").with_source(e))?;
                self.verification = row.map(AccountVerification::from_model).transpose()?;
                Ok(())
            }
            other => Err(AppError::internal(format!("unknown account association `{other}`"))),
        }
    }
}

impl TryIntoEntity for models::account::Model {
    type Entity = Account;

    fn try_into_entity(self) -> Result<Account, AppError> {
        Account::from_model(self)
    }
}

impl NotFoundKind for models::account::Model {
    fn not_found() -> AppError {
        AppError::not_found(code::ACCOUNT_NOT_FOUND, "account not found")
    }
}
