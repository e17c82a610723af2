use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use common::errors::AppError;
use models::db::DatabasePair;
use service::domain::{Account, Tenant};
use service::registration::{NewRegistration, RegistrationService};
use service::scope::RequestScope;

use crate::errors::ApiError;
use crate::middleware::transaction_scope;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabasePair,
    pub registration: Arc<RegistrationService>,
}

#[derive(Serialize)]
pub struct VerificationOutput {
    pub id: Uuid,
    pub token: String,
    pub verified: bool,
    pub expires_at: DateTime<FixedOffset>,
}

#[derive(Serialize)]
pub struct AccountOutput {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub status: String,
    pub verification: Option<VerificationOutput>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

#[derive(Serialize)]
pub struct TenantOutput {
    pub id: Uuid,
    pub name: String,
    pub timezone: String,
    pub phone: String,
    pub email: String,
    pub accounts: Vec<AccountOutput>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

#[derive(Serialize)]
pub struct TenantListOutput {
    pub total: u64,
    pub tenants: Vec<TenantOutput>,
}

impl From<&Account> for AccountOutput {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id(),
            tenant_id: account.tenant_id(),
            name: account.name().to_string(),
            email: account.email().to_string(),
            phone: account.phone().to_string(),
            status: account.status().as_str().to_string(),
            verification: account.verification().map(|v| VerificationOutput {
                id: v.id(),
                token: v.token().to_string(),
                verified: v.is_verified(),
                expires_at: v.expires_at(),
            }),
            created_at: account.created_at(),
            updated_at: account.updated_at(),
        }
    }
}

impl From<&Tenant> for TenantOutput {
    fn from(tenant: &Tenant) -> Self {
        Self {
            id: tenant.id(),
            name: tenant.name().to_string(),
            timezone: tenant.timezone().name().to_string(),
            phone: tenant.phone().to_string(),
            email: tenant.email().to_string(),
            accounts: tenant.accounts().iter().map(AccountOutput::from).collect(),
            created_at: tenant.created_at(),
            updated_at: tenant.updated_at(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub size: u64,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn register_tenant(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    payload: Result<Json<NewRegistration>, JsonRejection>,
) -> Result<(StatusCode, Json<TenantOutput>), ApiError> {
    let Json(input) = payload.map_err(|rejection| {
        ApiError::from(
            AppError::bad_request("malformed request body")
                .with_detail("parse_error", rejection.body_text()),
        )
    })?;
    let tenant = state.registration.register(&scope, input).await?;
    Ok((StatusCode::CREATED, Json(TenantOutput::from(&tenant))))
}

async fn list_tenants(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Query(params): Query<PageParams>,
) -> Result<Json<TenantListOutput>, ApiError> {
    let (tenants, total) = state
        .registration
        .list_tenants(&scope, params.page, params.size)
        .await?;
    Ok(Json(TenantListOutput {
        total,
        tenants: tenants.iter().map(TenantOutput::from).collect(),
    }))
}

async fn get_tenant(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(id): Path<Uuid>,
) -> Result<Json<TenantOutput>, ApiError> {
    let tenant = state.registration.tenant_by_id(&scope, id).await?;
    Ok(Json(TenantOutput::from(&tenant)))
}

async fn delete_tenant(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.registration.delete_tenant(&scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_account(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountOutput>, ApiError> {
    let account = state.registration.account_by_id(&scope, id).await?;
    Ok(Json(AccountOutput::from(&account)))
}

async fn verify_account(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(token): Path<String>,
) -> Result<Json<AccountOutput>, ApiError> {
    let account = state.registration.verify_account(&scope, &token).await?;
    Ok(Json(AccountOutput::from(&account)))
}

/// The API surface without middleware or state.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/tenants", post(register_tenant).get(list_tenants))
        .route("/tenants/:id", get(get_tenant).delete(delete_tenant))
        .route("/accounts/:id", get(get_account))
        .route("/verifications/:token/verify", post(verify_account))
}

/// Apply the middleware stack and materialize the router with its state.
/// Panics are contained inside the transaction scope, so an unwinding
/// handler surfaces as an opaque 500 and rolls its transaction back.
pub fn finish_router(router: Router<AppState>, state: AppState) -> Router {
    router
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn_with_state(state.clone(), transaction_scope))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    finish_router(api_routes(), state)
}
