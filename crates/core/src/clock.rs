//! Time source used for every expiry decision.
//!
//! Session TTLs and OTP cooldowns are evaluated lazily against `Clock::now`,
//! so tests swap in a `ManualClock` and advance it instead of sleeping.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Starts at the current wall-clock time.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    pub fn advance(&self, by: Duration) {
        *self.now.write() += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_now()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Whole seconds from `now` until `deadline`, rounded up, floored at zero.
///
/// Rounding up keeps a freshly minted 1800s window reporting 1800 rather
/// than 1799 a few microseconds later.
pub fn seconds_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let remaining_ms = (deadline - now).num_milliseconds();
    if remaining_ms <= 0 {
        0
    } else {
        ((remaining_ms + 999) / 1000) as u64
    }
}
