use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use common::errors::{code, AppError};

use super::account::Account;
use super::{parse_timezone, validate_email, validate_name, validate_phone};
use crate::repository::{self, AggregateMapping, NotFoundKind, TryIntoEntity};

/// Tenant aggregate root. Owns the accounts registered under it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tenant {
    id: Uuid,
    name: String,
    timezone: Tz,
    phone: String,
    email: String,
    accounts: Vec<Account>,
    created_at: DateTimeWithTimeZone,
    updated_at: DateTimeWithTimeZone,
}

impl Tenant {
    /// Validated factory; the only way to build a new tenant.
    pub fn new(name: &str, timezone: &str, phone: &str, email: &str) -> Result<Self, AppError> {
        validate_name(name)?;
        let timezone = parse_timezone(timezone)?;
        validate_phone(phone)?;
        validate_email(email)?;
        let now = Utc::now().into();
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            timezone,
            phone: phone.to_string(),
            email: email.to_string(),
            accounts: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn created_at(&self) -> DateTimeWithTimeZone {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTimeWithTimeZone {
        self.updated_at
    }

    /// Attach an account to be persisted with the tenant.
    pub fn attach_account(&mut self, account: Account) {
        self.accounts.push(account);
    }

    /// Rename the tenant.
    pub fn rename(&mut self, name: &str) -> Result<(), AppError> {
        validate_name(name)?;
        self.name = name.to_string();
        self.updated_at = Utc::now().into();
        Ok(())
    }

    /// Rebuild from a stored row, re-running field validation.
    pub(crate) fn from_model(model: models::tenant::Model) -> Result<Self, AppError> {
        let mut tenant = Self::new(&model.name, &model.timezone, &model.phone, &model.email)
            .map_err(|e| AppError::internal("stored tenant row failed domain validation").with_source(e))?;
        tenant.id = model.id;
        tenant.created_at = model.created_at;
        tenant.updated_at = model.updated_at;
        Ok(tenant)
    }
}

#[async_trait]
impl AggregateMapping for Tenant {
    type Store = models::tenant::Entity;
    type Active = models::tenant::ActiveModel;

    fn to_model(&self) -> models::tenant::ActiveModel {
        models::tenant::ActiveModel {
            id: Set(self.id),
            name: Set(self.name.clone()),
            timezone: Set(self.timezone.name().to_string()),
            phone: Set(self.phone.clone()),
            email: Set(self.email.clone()),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
        }
    }

    fn absorb(&mut self, saved: models::tenant::Model) -> Result<(), AppError> {
        let accounts = std::mem::take(&mut self.accounts);
        *self = Self::from_model(saved)?;
        self.accounts = accounts;
        Ok(())
    }

    async fn save_associations(&self, txn: &DatabaseTransaction) -> Result<(), AppError> {
        for account in &self.accounts {
            repository::upsert(account.to_model(), txn).await?;
            account.save_associations(txn).await?;
        }
        Ok(())
    }

    async fn load_association(&mut self, name: &str, read: &DatabaseConnection) -> Result<(), AppError> {
        match name {
            "accounts" => {
                let rows = models::account::Entity::find()
                    .filter(models::account::Column::TenantId.eq(self.id))
                    .all(read)
                    .await
                    .map_err(|e| AppError::internal("failed to load tenant accounts").with_source(e))?;
                self.accounts = rows
                    .into_iter()
                    .map(Account::from_model)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(())
            }
            other => Err(AppError::internal(format!("unknown tenant association `{other}`"))),
        }
    }
}

impl TryIntoEntity for models::tenant::Model {
    type Entity = Tenant;

    fn try_into_entity(self) -> Result<Tenant, AppError> {
        Tenant::from_model(self)
    }
}

impl NotFoundKind for models::tenant::Model {
    fn not_found() -> AppError {
        AppError::not_found(code::TENANT_NOT_FOUND, "tenant not found")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::errors::ErrorKind;
    use sea_orm::TryIntoModel;

    #[test]
    fn factory_rejects_invalid_fields() {
        assert!(Tenant::new("", "UTC", "+1000000001", "a@x.com").is_err());
        assert!(Tenant::new("acme", "Nowhere/City", "+1000000001", "a@x.com").is_err());
        assert!(Tenant::new("acme", "UTC", "12345", "a@x.com").is_err());
        let err = Tenant::new("acme", "UTC", "+1000000001", "nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnprocessableEntity);
    }

    #[test]
    fn round_trips_through_its_model() -> anyhow::Result<()> {
        for tag in 0..20 {
            let suffix = Uuid::new_v4().simple().to_string();
            let tenant = Tenant::new(
                &format!("tenant-{tag}-{suffix}"),
                "Asia/Tokyo",
                &format!("+8131200{tag:04}"),
                &format!("t{suffix}@example.com"),
            )?;
            let model = tenant.to_model().try_into_model()?;
            let back = Tenant::from_model(model)?;
            assert_eq!(back.id(), tenant.id());
            assert_eq!(back.name(), tenant.name());
            assert_eq!(back.timezone(), tenant.timezone());
            assert_eq!(back.phone(), tenant.phone());
            assert_eq!(back.email(), tenant.email());
            assert_eq!(back.created_at(), tenant.created_at());
            assert_eq!(back.updated_at(), tenant.updated_at());
        }
        Ok(())
    }
}
