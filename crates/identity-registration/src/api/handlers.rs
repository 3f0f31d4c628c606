//! HTTP request handlers.

use super::types::{FinalizeRequest, HealthResponse, InitiateRequest};
use super::AppState;
use crate::error::{ApiError, FinalizationError, InitiationError};
use crate::protocol::normalize_phone_number;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_healthy = state.registrar.store_healthy().await;

    Json(HealthResponse {
        status: if store_healthy { "ok" } else { "degraded" }.to_string(),
        store_healthy,
    })
}

/// Phase 1: issue a one-time code for a claimed identity key.
pub async fn initiate(
    State(state): State<AppState>,
    payload: Result<Json<InitiateRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload.map_err(|e| {
        debug!("Rejected initiate body: {}", e);
        InitiationError::MalformedInput(e.body_text())
    })?;

    state
        .registrar
        .initiate(&request.phone, &request.identity_key)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Phase 2: redeem the code and register the key bundle.
pub async fn finalize(
    State(state): State<AppState>,
    payload: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload.map_err(|e| {
        debug!("Rejected finalize body: {}", e);
        FinalizationError::MalformedInput(e.body_text())
    })?;

    // Only attempts that can reach a live pending record spend the phone's
    // budget. Everything else fails in the registrar without side effects.
    if let Ok(phone) = normalize_phone_number(&request.phone) {
        if matches!(state.registrar.has_pending(&phone).await, Ok(true)) {
            state.rate_limit.check_finalize(&phone)?;
        }
    }

    state.registrar.finalize(request.into()).await?;

    Ok(StatusCode::NO_CONTENT)
}
