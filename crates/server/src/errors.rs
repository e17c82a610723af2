use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, error};

use common::errors::AppError;

/// Marker stamped onto responses produced from an error; the transaction
/// middleware reads it to decide rollback.
#[derive(Debug, Clone, Copy)]
pub struct FailureMarker;

/// Transport wrapper translating taxonomy errors into HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "request failed");
        } else {
            debug!(code = self.0.code(), error = %self.0, "request rejected");
        }
        let body = serde_json::json!({
            "code": self.0.code(),
            "message": self.0.message(),
            "details": self.0.details(),
        });
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(FailureMarker);
        response
    }
}
