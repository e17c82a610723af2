//! Error taxonomy shared by every layer.
//!
//! Each error carries a classification kind, a stable numeric code for
//! external mapping/logging, a human message and a JSON detail map. The
//! delivery layer translates the kind into an HTTP status; nothing below it
//! writes responses.

use serde_json::{Map, Value};
use thiserror::Error;

/// Classification of a failure, used to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input rejected before domain validation.
    BadRequest,
    /// Domain validation failed.
    UnprocessableEntity,
    /// A uniqueness check found a pre-existing conflicting row.
    Conflict,
    /// A retrieval matched no row; the code identifies the aggregate.
    NotFound,
    /// Transaction, connection or mapping failure, or anything unexpected.
    Internal,
}

/// Stable numeric codes for external mapping/logging.
pub mod code {
    pub const BAD_REQUEST: u16 = 40001;
    pub const UNPROCESSABLE_ENTITY: u16 = 42201;
    pub const CONFLICT: u16 = 40901;
    pub const TENANT_NOT_FOUND: u16 = 40401;
    pub const ACCOUNT_NOT_FOUND: u16 = 40402;
    pub const VERIFICATION_NOT_FOUND: u16 = 40403;
    pub const INTERNAL: u16 = 50001;
}

/// Structured error value propagated up the call stack.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    code: u16,
    message: String,
    details: Map<String, Value>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    fn new(kind: ErrorKind, code: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            details: Map::new(),
            source: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, code::BAD_REQUEST, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnprocessableEntity, code::UNPROCESSABLE_ENTITY, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, code::CONFLICT, message)
    }

    /// Not-found with the aggregate-specific code from [`code`].
    pub fn not_found(code: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, code, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, code::INTERNAL, message)
    }

    /// Attach a key/value pair to the detail map.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    /// HTTP status class for this kind.
    pub fn status(&self) -> u16 {
        match self.kind {
            ErrorKind::BadRequest => 400,
            ErrorKind::UnprocessableEntity => 422,
            ErrorKind::Conflict => 409,
            ErrorKind::NotFound => 404,
            ErrorKind::Internal => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_status_and_code() {
        assert_eq!(AppError::bad_request("x").status(), 400);
        assert_eq!(AppError::bad_request("x").code(), code::BAD_REQUEST);
        assert_eq!(AppError::unprocessable("x").status(), 422);
        assert_eq!(AppError::conflict("x").status(), 409);
        assert_eq!(AppError::internal("x").status(), 500);

        let nf = AppError::not_found(code::ACCOUNT_NOT_FOUND, "account not found");
        assert_eq!(nf.status(), 404);
        assert_eq!(nf.code(), code::ACCOUNT_NOT_FOUND);
        assert_eq!(nf.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn details_accumulate() {
        let err = AppError::unprocessable("validation failed")
            .with_detail("phone", "must start with '+'")
            .with_detail("email", "missing '@'");
        assert_eq!(err.details().len(), 2);
        assert_eq!(err.details()["phone"], "must start with '+'");
    }

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = AppError::internal("save failed").with_source(io);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "save failed");
    }
}
