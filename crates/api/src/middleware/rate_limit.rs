//! Per-client request throttle.
//!
//! Guards the OTP routes against request floods before they reach the
//! attempt tracker. This is transport-level protection only; the OTP
//! lockout itself lives in `wizard_core::otp`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tracing::warn;

use crate::extractors::ClientIp;
use crate::response::ApiError;
use crate::state::AppState;

/// Token bucket rate limiter.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    config: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained requests per second per client
    pub rate: u32,
    /// Burst size
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { rate: 5, burst: 20 }
    }
}

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(burst: u32) -> Self {
        Self {
            tokens: burst as f64,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, rate: u32, burst: u32) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;

        self.tokens = (self.tokens + elapsed * rate as f64).min(burst as f64);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Check if request is allowed for the given key.
    pub fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock();

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.config.burst));

        bucket.try_acquire(self.config.rate, self.config.burst)
    }

    /// Whole seconds until a drained bucket holds one token again.
    pub fn retry_after_secs(&self) -> u64 {
        if self.config.rate == 0 {
            return 60;
        }
        (1.0 / self.config.rate as f64).ceil().max(1.0) as u64
    }

    /// Drop buckets idle for longer than `max_age`.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        let now = Instant::now();

        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
        before - buckets.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Shared rate limiter state.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Rejects requests from clients that exhausted their bucket.
pub async fn throttle(
    State(state): State<AppState>,
    client: ClientIp,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.throttle.check(client.bucket_key()) {
        metrics().throttled_requests.inc();
        warn!(
            client = %client.bucket_key(),
            path = %request.uri().path(),
            "Request throttled"
        );
        return Err(ApiError::throttled(state.throttle.retry_after_secs()));
    }

    Ok(next.run(request).await)
}
