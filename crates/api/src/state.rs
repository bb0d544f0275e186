//! Application state shared across handlers.

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use telemetry::{metrics, HealthRegistry};
use tracing::{debug, info, warn};
use wizard_core::{DraftStore, OtpAttemptTracker, SessionStore};

use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter, SharedRateLimiter};
use crate::response::ApiError;

/// Idle throttle buckets are dropped after this long.
const THROTTLE_BUCKET_MAX_AGE: Duration = Duration::from_secs(600);

/// Lookup key used to probe store reachability. Never a real session id.
const STORE_PROBE_KEY: &str = "readiness-probe";

/// Background purge of logically expired records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between sweeps
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
    /// Seconds a record is kept past its logical expiry
    #[serde(default = "default_grace")]
    pub grace_secs: i64,
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_grace() -> i64 {
    3600
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_sweep_interval(),
            grace_secs: default_grace(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub drafts: Arc<DraftStore>,
    pub otp: Arc<OtpAttemptTracker>,
    pub health: Arc<HealthRegistry>,
    /// Per-client throttle in front of the OTP routes
    pub throttle: SharedRateLimiter,
    /// Reject draft writes unless the owning session is live
    pub require_live_session: bool,
    /// Log issued OTP codes at debug level. Development only.
    pub log_otp_codes: bool,
}

impl AppState {
    pub fn new(sessions: SessionStore, drafts: DraftStore, otp: OtpAttemptTracker) -> Self {
        Self {
            sessions: Arc::new(sessions),
            drafts: Arc::new(drafts),
            otp: Arc::new(otp),
            health: Arc::new(HealthRegistry::new()),
            throttle: Arc::new(RateLimiter::new(RateLimitConfig::default())),
            require_live_session: false,
            log_otp_codes: false,
        }
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.throttle = Arc::new(RateLimiter::new(config));
        self
    }

    pub fn with_live_session_requirement(mut self, required: bool) -> Self {
        self.require_live_session = required;
        self
    }

    pub fn with_otp_code_logging(mut self, enabled: bool) -> Self {
        self.log_otp_codes = enabled;
        self
    }

    /// Probes the record store and updates the `store` health component.
    pub fn check_store(&self) -> bool {
        match self.sessions.validate(STORE_PROBE_KEY) {
            Ok(_) => {
                self.health.store.set_healthy();
                true
            }
            Err(e) => {
                warn!(error = %e, "Store probe failed");
                self.health.store.set_unhealthy(e.to_string());
                false
            }
        }
    }

    /// Enforces the live-session policy for draft writes.
    pub fn ensure_live_session(&self, session_id: &str) -> Result<(), ApiError> {
        if !self.require_live_session {
            return Ok(());
        }
        let lookup = self.sessions.get(session_id)?;
        lookup.into_result(session_id)?;
        Ok(())
    }

    /// One retention pass. Returns the number of records removed.
    pub fn sweep(&self, grace: ChronoDuration) -> usize {
        let mut purged = 0;
        let mut failed = None;

        match self.sessions.purge_expired(grace) {
            Ok(n) => purged += n,
            Err(e) => failed = Some(format!("session purge failed: {}", e)),
        }
        match self.otp.purge_idle(grace) {
            Ok(n) => purged += n,
            Err(e) => failed = Some(format!("otp purge failed: {}", e)),
        }

        match failed {
            Some(msg) => {
                warn!(error = %msg, "Retention sweep incomplete");
                self.health.sweeper.set_unhealthy(msg);
            }
            None => self.health.sweeper.set_healthy(),
        }

        let m = metrics();
        m.records_purged.inc_by(purged as u64);
        m.tracked_sessions.set(self.sessions.len() as u64);
        m.tracked_drafts.set(self.drafts.len() as u64);
        m.tracked_otp_numbers.set(self.otp.len() as u64);

        if purged > 0 {
            debug!(purged = purged, "Retention sweep");
        }
        purged
    }

    /// Start the retention sweeper background task.
    ///
    /// With retention disabled nothing is spawned and the sweeper component
    /// is reported healthy.
    pub fn start_retention_sweeper(
        &self,
        config: &RetentionConfig,
    ) -> Option<tokio::task::JoinHandle<()>> {
        if !config.enabled {
            self.health.sweeper.set_healthy();
            info!("Retention sweeper disabled");
            return None;
        }

        let state = self.clone();
        let grace = ChronoDuration::seconds(config.grace_secs);
        let period = Duration::from_secs(config.interval_secs.max(1));
        info!(
            interval_secs = period.as_secs(),
            grace_secs = config.grace_secs,
            "Started retention sweeper"
        );

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                state.sweep(grace);
            }
        }))
    }

    /// Start the throttle bucket cleanup background task.
    pub fn start_rate_limiter_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let throttle = self.throttle.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                let dropped = throttle.cleanup(THROTTLE_BUCKET_MAX_AGE);
                if dropped > 0 {
                    debug!(dropped = dropped, "Dropped idle throttle buckets");
                }
            }
        })
    }
}
