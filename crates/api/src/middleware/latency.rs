//! Request latency tracking.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use telemetry::metrics;

/// Records every request's wall time in the latency histogram.
pub async fn track_latency(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    metrics()
        .request_latency_ms
        .observe(start.elapsed().as_millis() as u64);
    response
}
