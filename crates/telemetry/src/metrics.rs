//! In-process service metrics.
//!
//! Counters are bumped from the api handlers and the retention sweeper and
//! read back through `GET /metrics` as a JSON snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Point-in-time value.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Upper bounds: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s
    buckets: [AtomicU64; 9],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 9] = [1, 5, 10, 25, 50, 100, 250, 500, 1000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// (upper bound, count) pairs. The last bucket also holds overflow.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Service-wide metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    // Sessions
    pub sessions_created: Counter,
    pub sessions_extended: Counter,
    pub sessions_ended: Counter,
    pub expired_session_reads: Counter,

    // Drafts
    pub drafts_initialized: Counter,
    pub draft_steps_saved: Counter,
    pub draft_save_conflicts: Counter,
    pub drafts_submitted: Counter,

    // OTP
    pub otp_requested: Counter,
    pub otp_verified: Counter,
    pub otp_failed: Counter,
    pub otp_rate_limited: Counter,

    // Transport
    pub throttled_requests: Counter,
    pub request_latency_ms: Histogram,

    // Retention sweeper
    pub records_purged: Counter,
    pub tracked_sessions: Gauge,
    pub tracked_drafts: Gauge,
    pub tracked_otp_numbers: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            sessions_created: self.sessions_created.get(),
            sessions_extended: self.sessions_extended.get(),
            sessions_ended: self.sessions_ended.get(),
            expired_session_reads: self.expired_session_reads.get(),
            drafts_initialized: self.drafts_initialized.get(),
            draft_steps_saved: self.draft_steps_saved.get(),
            draft_save_conflicts: self.draft_save_conflicts.get(),
            drafts_submitted: self.drafts_submitted.get(),
            otp_requested: self.otp_requested.get(),
            otp_verified: self.otp_verified.get(),
            otp_failed: self.otp_failed.get(),
            otp_rate_limited: self.otp_rate_limited.get(),
            throttled_requests: self.throttled_requests.get(),
            request_count: self.request_latency_ms.count(),
            request_latency_mean_ms: self.request_latency_ms.mean(),
            request_latency_buckets: self.request_latency_ms.buckets(),
            records_purged: self.records_purged.get(),
            tracked_sessions: self.tracked_sessions.get(),
            tracked_drafts: self.tracked_drafts.get(),
            tracked_otp_numbers: self.tracked_otp_numbers.get(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub sessions_created: u64,
    pub sessions_extended: u64,
    pub sessions_ended: u64,
    pub expired_session_reads: u64,
    pub drafts_initialized: u64,
    pub draft_steps_saved: u64,
    pub draft_save_conflicts: u64,
    pub drafts_submitted: u64,
    pub otp_requested: u64,
    pub otp_verified: u64,
    pub otp_failed: u64,
    pub otp_rate_limited: u64,
    pub throttled_requests: u64,
    pub request_count: u64,
    pub request_latency_mean_ms: f64,
    pub request_latency_buckets: Vec<(u64, u64)>,
    pub records_purged: u64,
    pub tracked_sessions: u64,
    pub tracked_drafts: u64,
    pub tracked_otp_numbers: u64,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
