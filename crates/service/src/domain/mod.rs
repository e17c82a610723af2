//! Validated domain entities.
//!
//! Entities are constructed only through their factory functions, expose
//! state through accessors and change only through explicit domain methods.
//! Loading from storage re-runs the same validation; a stored row that fails
//! it surfaces as an internal error, distinguishable from a factory
//! validation failure.

mod account;
mod tenant;
mod verification;

pub use account::{Account, AccountStatus};
pub use tenant::Tenant;
pub use verification::AccountVerification;

use chrono_tz::Tz;

use common::errors::AppError;

pub(crate) fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() || name.len() > 128 {
        return Err(AppError::unprocessable("invalid name")
            .with_detail("name", "must be 1..=128 characters"));
    }
    Ok(())
}

pub(crate) fn validate_phone(phone: &str) -> Result<(), AppError> {
    let valid = phone
        .strip_prefix('+')
        .map(|digits| (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    if !valid {
        return Err(AppError::unprocessable("invalid phone number")
            .with_detail("phone", "must be '+' followed by 7..=15 digits"));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && !domain.is_empty())
            .unwrap_or(false);
    if !valid {
        return Err(AppError::unprocessable("invalid email address")
            .with_detail("email", "must contain a local part and a domain"));
    }
    Ok(())
}

pub(crate) fn parse_timezone(timezone: &str) -> Result<Tz, AppError> {
    timezone.parse::<Tz>().map_err(|_| {
        AppError::unprocessable("invalid IANA timezone").with_detail("timezone", timezone)
    })
}
