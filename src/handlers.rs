use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::errors::{AppError, ResultExt};
use crate::intake::IntakeService;
use crate::models::{Lead, SubmitResult};
use crate::notification::{LeadNotifier, WhatsAppNotifier};
use crate::storage::{LeadRepository, LeadStore};

/// Contact-form payloads are small; anything larger is rejected before parsing.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state injected into handlers.
pub struct AppState<S = LeadRepository, N = WhatsAppNotifier> {
    /// The lead intake pipeline (store + notifier).
    pub intake: IntakeService<S, N>,
    /// Bearer token for the administrative routes. `None` disables them.
    pub admin_token: Option<String>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-intake-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/leads
///
/// Receives a contact-form submission. Responds `{success: true, lead}` once
/// the lead is stored, whatever happened to the WhatsApp notification.
pub async fn create_lead<S: LeadStore, N: LeadNotifier>(
    State(state): State<Arc<AppState<S, N>>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SubmitResult>, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    tracing::info!("POST /api/leads");

    let result = state.intake.submit(payload).await?;
    Ok(Json(result))
}

/// GET /api/leads
///
/// All stored leads, oldest first. Requires the admin token.
pub async fn list_leads<S: LeadStore, N: LeadNotifier>(
    State(state): State<Arc<AppState<S, N>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Lead>>, AppError> {
    authorize_admin(state.admin_token.as_deref(), &headers)?;

    let leads = state
        .intake
        .store()
        .list_all()
        .await
        .context("Failed to list leads")?;
    tracing::info!("GET /api/leads - {} lead(s)", leads.len());

    Ok(Json(leads))
}

/// GET /api/leads/:id
pub async fn get_lead<S: LeadStore, N: LeadNotifier>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Lead>, AppError> {
    authorize_admin(state.admin_token.as_deref(), &headers)?;
    tracing::info!("GET /api/leads/{}", id);

    state
        .intake
        .store()
        .get_by_id(&id)
        .await
        .context(format!("Failed to load lead {}", id))?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
}

/// DELETE /api/leads/:id
pub async fn delete_lead<S: LeadStore, N: LeadNotifier>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    authorize_admin(state.admin_token.as_deref(), &headers)?;
    tracing::info!("DELETE /api/leads/{}", id);

    let removed = state
        .intake
        .store()
        .delete_by_id(&id)
        .await
        .context(format!("Failed to delete lead {}", id))?;

    if !removed {
        return Err(AppError::NotFound(format!("Lead {} not found", id)));
    }

    Ok(Json(json!({ "success": true, "id": id })))
}

/// Checks `Authorization: Bearer <token>` against the configured admin token.
///
/// With no admin token configured every request is rejected.
fn authorize_admin(expected: Option<&str>, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = expected else {
        return Err(AppError::Unauthorized(
            "Admin routes disabled: ADMIN_TOKEN not configured".to_string(),
        ));
    };

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    if !constant_time_compare(token.trim(), expected) {
        return Err(AppError::Unauthorized("Invalid admin token".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison (basic implementation)
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Lead routes, still missing their state so callers can add layers (rate limiting).
pub fn api_routes<S: LeadStore, N: LeadNotifier>() -> Router<Arc<AppState<S, N>>> {
    Router::new()
        .route(
            "/api/leads",
            get(list_leads::<S, N>).post(create_lead::<S, N>),
        )
        .route(
            "/api/leads/:id",
            get(get_lead::<S, N>).delete(delete_lead::<S, N>),
        )
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)))
}

/// Full application: health check plus `api`, with tracing and CORS.
pub fn app<S: LeadStore, N: LeadNotifier>(
    state: Arc<AppState<S, N>>,
    api: Router<Arc<AppState<S, N>>>,
) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Application without rate limiting.
pub fn router<S: LeadStore, N: LeadNotifier>(state: Arc<AppState<S, N>>) -> Router {
    app(state, api_routes())
}
