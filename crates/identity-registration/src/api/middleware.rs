//! Rate limiting and request logging.

use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{keyed::DefaultKeyedStateStore, InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{
    num::NonZeroU32,
    sync::{Arc, Weak},
    time::Duration,
};
use tracing::{debug, warn};

/// Global rate limiter (not keyed).
pub type GlobalLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter keyed by normalized phone number.
pub type PhoneLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiter state shared across requests.
#[derive(Clone)]
pub struct RateLimitState {
    /// Limit on all registration requests
    pub global: Arc<GlobalLimiter>,
    /// Limit on finalization attempts for one phone number
    pub finalize_per_phone: Arc<PhoneLimiter>,
}

impl RateLimitState {
    /// Create a new rate limit state with the specified limits.
    pub fn new(requests_per_minute: u32, finalize_per_phone_per_hour: u32) -> Self {
        let global = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
        let per_phone =
            Quota::per_hour(NonZeroU32::new(finalize_per_phone_per_hour).unwrap_or(NonZeroU32::MIN));

        Self::with_quotas(global, per_phone)
    }

    /// Create a rate limit state from explicit quotas.
    pub fn with_quotas(global: Quota, finalize_per_phone: Quota) -> Self {
        Self {
            global: Arc::new(RateLimiter::direct(global)),
            finalize_per_phone: Arc::new(RateLimiter::keyed(finalize_per_phone)),
        }
    }

    /// Create a permissive rate limiter for testing.
    pub fn permissive() -> Self {
        Self::new(1000, 1000)
    }

    /// Record a finalization attempt for `phone`.
    pub fn check_finalize(&self, phone: &str) -> Result<(), ApiError> {
        if self.finalize_per_phone.check_key(&phone.to_string()).is_err() {
            warn!(phone = %phone, "Finalization attempt limit exceeded");
            return Err(ApiError::RateLimitExceeded);
        }
        Ok(())
    }

    /// Forget phone numbers whose budget has fully replenished.
    /// Returns how many numbers are still tracked.
    pub fn prune(&self) -> usize {
        prune(&self.finalize_per_phone)
    }

    /// Spawn a background task that prunes the per-phone limiter every
    /// `interval`. The task stops once the last handle is dropped.
    pub fn spawn_pruning(&self, interval: Duration) {
        let limiter = Arc::downgrade(&self.finalize_per_phone);
        tokio::spawn(async move {
            prune_loop(limiter, interval).await;
        });
    }
}

async fn prune_loop(limiter: Weak<PhoneLimiter>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;

        let Some(limiter) = limiter.upgrade() else {
            debug!("Rate limiter dropped, stopping pruning");
            return;
        };

        let tracked = prune(&limiter);
        debug!("Pruned per-phone rate limiter, {} numbers still tracked", tracked);
    }
}

fn prune(limiter: &PhoneLimiter) -> usize {
    limiter.retain_recent();
    limiter.shrink_to_fit();
    limiter.len()
}

/// Rate limiting middleware.
///
/// Checks the global rate limit and returns 429 Too Many Requests if exceeded.
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if rate_limit.global.check().is_err() {
        warn!("Global rate limit exceeded");
        return Err(ApiError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}

/// Logging middleware for requests.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        warn!(%method, %path, %status, ?duration, "Request failed");
    } else {
        debug!(%method, %path, %status, ?duration, "Request completed");
    }

    response
}
