use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use service::scope::RequestScope;

use crate::errors::{ApiError, FailureMarker};
use crate::routes::AppState;

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Bracket the downstream pipeline with one request scope: a write
/// transaction for mutating verbs plus a read session, opened before the
/// handlers run and finalized exactly once afterwards. A response carrying a
/// [`FailureMarker`] or an error-class status rolls the transaction back;
/// anything else commits. A finalize failure aborts response writing with
/// a 500.
pub async fn transaction_scope(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mutating = is_mutating(request.method());
    let scope = match RequestScope::begin(&state.db, mutating).await {
        Ok(scope) => scope,
        Err(e) => return ApiError::from(e).into_response(),
    };
    request.extensions_mut().insert(scope.clone());

    let response = next.run(request).await;

    let failed = response.extensions().get::<FailureMarker>().is_some()
        || response.status().is_client_error()
        || response.status().is_server_error();
    match scope.finalize(failed).await {
        Ok(outcome) => {
            debug!(?outcome, status = %response.status(), "request scope finalized");
            response
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
