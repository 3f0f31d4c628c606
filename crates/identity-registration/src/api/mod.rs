//! HTTP API for the enrollment protocol.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{logging_middleware, rate_limit_middleware, RateLimitState};
pub use types::*;

use crate::protocol::Registrar;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Protocol handlers bound to the process-wide store
    pub registrar: Arc<Registrar>,
    /// Request rate limits
    pub rate_limit: RateLimitState,
}

impl AppState {
    /// Create new application state.
    pub fn new(registrar: Registrar, rate_limit: RateLimitState) -> Self {
        Self {
            registrar: Arc::new(registrar),
            rate_limit,
        }
    }
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/registration/initiate", post(handlers::initiate))
        .route("/v1/registration/finalize", post(handlers::finalize))
        .layer(axum_middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_middleware,
        ))
        // Health check (no rate limiting)
        .route("/health", get(handlers::health))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
