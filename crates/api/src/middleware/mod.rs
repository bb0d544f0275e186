//! HTTP middleware.

pub mod latency;
pub mod rate_limit;
