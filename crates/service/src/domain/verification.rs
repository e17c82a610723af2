use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::Set;
use uuid::Uuid;

use common::errors::{code, AppError};

use crate::repository::{AggregateMapping, NotFoundKind, TryIntoEntity};

/// Verification token issued for a freshly registered account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountVerification {
    id: Uuid,
    account_id: Uuid,
    token: String,
    verified: bool,
    expires_at: DateTimeWithTimeZone,
    created_at: DateTimeWithTimeZone,
    updated_at: DateTimeWithTimeZone,
}

impl AccountVerification {
    /// Issue a fresh, unverified token valid for `ttl`.
    pub fn issue(account_id: Uuid, ttl: Duration) -> Result<Self, AppError> {
        if ttl <= Duration::zero() {
            return Err(AppError::unprocessable("verification ttl must be positive")
                .with_detail("ttl", ttl.to_string()));
        }
        let now: DateTimeWithTimeZone = Utc::now().into();
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            token: Uuid::new_v4().simple().to_string(),
            verified: false,
            expires_at: now + ttl,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn account_id(&self) -> Uuid {
        self.account_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn expires_at(&self) -> DateTimeWithTimeZone {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTimeWithTimeZone {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTimeWithTimeZone {
        self.updated_at
    }

    pub fn is_expired(&self, now: DateTimeWithTimeZone) -> bool {
        now > self.expires_at
    }

    /// Confirm the verification. Fails when the token already ran its course.
    pub fn mark_verified(&mut self, now: DateTimeWithTimeZone) -> Result<(), AppError> {
        if self.verified {
            return Err(AppError::unprocessable("verification already confirmed"));
        }
        if self.is_expired(now) {
            return Err(AppError::unprocessable("verification token expired"));
        }
        self.verified = true;
        self.updated_at = now;
        Ok(())
    }

    /// Rebuild from a stored row.
    pub(crate) fn from_model(model: models::account_verification::Model) -> Result<Self, AppError> {
        if model.token.trim().is_empty() {
            return Err(AppError::internal("stored verification row has an empty token"));
        }
        Ok(Self {
            id: model.id,
            account_id: model.account_id,
            token: model.token,
            verified: model.verified,
            expires_at: model.expires_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[async_trait]
impl AggregateMapping for AccountVerification {
    type Store = models::account_verification::Entity;
    type Active = models::account_verification::ActiveModel;

    fn to_model(&self) -> models::account_verification::ActiveModel {
        models::account_verification::ActiveModel {
            id: Set(self.id),
            account_id: Set(self.account_id),
            token: Set(self.token.clone()),
            verified: Set(self.verified),
            expires_at: Set(self.expires_at),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
        }
    }

    fn absorb(&mut self, saved: models::account_verification::Model) -> Result<(), AppError> {
        *self = Self::from_model(saved)?;
        Ok(())
    }
}

impl TryIntoEntity for models::account_verification::Model {
    type Entity = AccountVerification;

    fn try_into_entity(self) -> Result<AccountVerification, AppError> {
        AccountVerification::from_model(self)
    }
}

impl NotFoundKind for models::account_verification::Model {
    fn not_found() -> AppError {
        AppError::not_found(code::VERIFICATION_NOT_FOUND, "verification not found")
    }
}
