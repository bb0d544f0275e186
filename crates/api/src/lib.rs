//! HTTP API layer for the wizard state service.

pub mod extractors;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

pub use middleware::rate_limit::RateLimitConfig;
pub use routes::router;
pub use state::{AppState, RetentionConfig};
