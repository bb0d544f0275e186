//! API routes.

pub mod draft;
pub mod health;
pub mod otp;
pub mod session;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::{latency::track_latency, rate_limit::throttle};
use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let otp_routes = Router::new()
        .route("/otp/request", post(otp::request_otp))
        .route("/otp/verify", post(otp::verify_otp))
        .route("/otp/status/:mobile", get(otp::otp_status))
        .route_layer(from_fn_with_state(state.clone(), throttle));

    Router::new()
        .route("/sessions", post(session::create_session))
        .route(
            "/sessions/:id",
            get(session::get_session).delete(session::end_session),
        )
        .route("/sessions/:id/extend", post(session::extend_session))
        .route("/sessions/:id/validate", get(session::validate_session))
        .route(
            "/drafts/:session_id",
            post(draft::initialize_draft)
                .get(draft::get_draft)
                .delete(draft::clear_draft),
        )
        .route("/drafts/:session_id/versions", get(draft::get_step_versions))
        .route(
            "/drafts/:session_id/steps/:step",
            put(draft::save_step).get(draft::get_step_data),
        )
        .merge(otp_routes)
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .route("/metrics", get(health::metrics_handler))
        .layer(from_fn(track_latency))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
