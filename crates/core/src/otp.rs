//! Per-mobile-number OTP challenge and attempt tracking.
//!
//! A record moves through `Fresh -> Active -> Locked` and back to `Active`
//! once the cooldown has elapsed. Lock expiry is passive: the first read or
//! write at or after `lock_expires_at` restores the full attempt budget.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{seconds_until, Clock};
use crate::error::{Error, Result};
use crate::limits::{OTP_CODE_LEN, OTP_CODE_TTL_SECS, OTP_COOLDOWN_SECS, OTP_MAX_ATTEMPTS};
use crate::mobile::MobileNumber;
use crate::store::{modify, KeyedStore, Retention};

/// Stored attempt state for one mobile number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpAttemptState {
    pub mobile_number: MobileNumber,
    pub remaining_attempts: u32,
    pub max_attempts: u32,
    pub is_locked: bool,
    pub lock_expires_at: Option<DateTime<Utc>>,
    /// Outstanding code, cleared once used or on lockout
    #[serde(skip)]
    pub expected_code: Option<String>,
    pub code_expires_at: Option<DateTime<Utc>>,
    /// Assigned on the first successful verification and kept afterwards.
    /// Records holding one are never purged.
    pub user_id: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl OtpAttemptState {
    pub fn fresh(mobile_number: MobileNumber, max_attempts: u32) -> Self {
        Self {
            mobile_number,
            remaining_attempts: max_attempts,
            max_attempts,
            is_locked: false,
            lock_expires_at: None,
            expected_code: None,
            code_expires_at: None,
            user_id: None,
            last_attempt_at: None,
        }
    }

    /// Clears a lock whose cooldown has elapsed. Returns whether it did.
    fn reconcile(&mut self, now: DateTime<Utc>) -> bool {
        match self.lock_expires_at {
            Some(until) if self.is_locked && now >= until => {
                self.reset_attempts();
                true
            }
            _ => false,
        }
    }

    fn reset_attempts(&mut self) {
        self.remaining_attempts = self.max_attempts;
        self.is_locked = false;
        self.lock_expires_at = None;
    }

    fn clear_challenge(&mut self) {
        self.expected_code = None;
        self.code_expires_at = None;
    }

    fn lock_active(&self, now: DateTime<Utc>) -> bool {
        self.is_locked && self.lock_expires_at.is_some_and(|until| now < until)
    }

    fn code_matches(&self, code: &str, now: DateTime<Utc>) -> bool {
        let live = self.code_expires_at.is_some_and(|until| now < until);
        live && self.expected_code.as_deref() == Some(code)
    }

    pub fn cooldown_seconds(&self, now: DateTime<Utc>) -> u64 {
        match self.lock_expires_at {
            Some(until) if self.is_locked => seconds_until(until, now),
            _ => 0,
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> OtpStatus {
        OtpStatus {
            mobile_number: self.mobile_number.clone(),
            remaining_attempts: self.remaining_attempts,
            max_attempts: self.max_attempts,
            is_locked: self.is_locked,
            lock_expires_at: self.lock_expires_at,
            cooldown_seconds: self.cooldown_seconds(now),
        }
    }
}

impl Retention for OtpAttemptState {
    fn retain_until(&self) -> Option<DateTime<Utc>> {
        if self.user_id.is_some() {
            return None;
        }

        [
            self.lock_expires_at,
            self.code_expires_at,
            self.last_attempt_at,
        ]
        .into_iter()
        .flatten()
        .max()
    }
}

/// Attempt state as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpStatus {
    pub mobile_number: MobileNumber,
    pub remaining_attempts: u32,
    pub max_attempts: u32,
    pub is_locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_expires_at: Option<DateTime<Utc>>,
    pub cooldown_seconds: u64,
}

/// Produces the code for a new challenge.
pub trait OtpCodeSource: Send + Sync {
    fn generate(&self) -> String;
}

/// Always issues the same code. Development and tests only.
#[derive(Debug, Clone)]
pub struct FixedCode(pub String);

impl OtpCodeSource for FixedCode {
    fn generate(&self) -> String {
        self.0.clone()
    }
}

/// Random zero-padded numeric code drawn from a v4 UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCode;

impl OtpCodeSource for RandomCode {
    fn generate(&self) -> String {
        let modulus = 10u128.pow(OTP_CODE_LEN as u32);
        let n = Uuid::new_v4().as_u128() % modulus;
        format!("{:0width$}", n, width = OTP_CODE_LEN)
    }
}

/// Attempt budget and time windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OtpPolicy {
    pub max_attempts: u32,
    pub cooldown: Duration,
    pub code_ttl: Duration,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            max_attempts: OTP_MAX_ATTEMPTS,
            cooldown: Duration::seconds(OTP_COOLDOWN_SECS),
            code_ttl: Duration::seconds(OTP_CODE_TTL_SECS),
        }
    }
}

/// A freshly issued challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpChallenge {
    pub expires_in_seconds: u64,
    pub remaining_attempts: u32,
    /// Handed to the delivery channel, never to the requester
    #[serde(skip)]
    pub code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OtpRequestOutcome {
    Issued(OtpChallenge),
    RateLimited { cooldown_seconds: u64 },
}

impl OtpRequestOutcome {
    pub fn into_result(self) -> Result<OtpChallenge> {
        match self {
            Self::Issued(challenge) => Ok(challenge),
            Self::RateLimited { cooldown_seconds } => Err(Error::otp_rate_limited(cooldown_seconds)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OtpVerifyOutcome {
    Verified { user_id: String },
    InvalidCode { remaining_attempts: u32 },
    /// Either already locked, or this attempt used up the budget.
    RateLimited { cooldown_seconds: u64 },
}

/// Successful verification as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerification {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl OtpVerifyOutcome {
    pub fn into_result(self) -> Result<OtpVerification> {
        match self {
            Self::Verified { user_id } => Ok(OtpVerification {
                verified: true,
                user_id: Some(user_id),
            }),
            Self::InvalidCode { remaining_attempts } => Err(Error::invalid_otp(remaining_attempts)),
            Self::RateLimited { cooldown_seconds } => Err(Error::otp_rate_limited(cooldown_seconds)),
        }
    }
}

/// Owns OTP attempt records.
pub struct OtpAttemptTracker {
    records: Arc<dyn KeyedStore<OtpAttemptState>>,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn OtpCodeSource>,
    policy: OtpPolicy,
}

impl OtpAttemptTracker {
    pub fn new(
        records: Arc<dyn KeyedStore<OtpAttemptState>>,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn OtpCodeSource>,
    ) -> Self {
        Self {
            records,
            clock,
            codes,
            policy: OtpPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: OtpPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> OtpPolicy {
        self.policy
    }

    /// Issues a new challenge unless the number is in cooldown.
    ///
    /// Issuing never consumes an attempt and replaces any outstanding code.
    pub fn request(&self, mobile: &MobileNumber) -> Result<OtpRequestOutcome> {
        let now = self.clock.now();
        let policy = self.policy;
        let code = self.codes.generate();

        let outcome = modify(
            self.records.as_ref(),
            mobile.as_str(),
            |slot: &mut Option<OtpAttemptState>| {
                let state = slot
                    .get_or_insert_with(|| OtpAttemptState::fresh(mobile.clone(), policy.max_attempts));
                state.reconcile(now);

                if state.lock_active(now) {
                    return OtpRequestOutcome::RateLimited {
                        cooldown_seconds: state.cooldown_seconds(now),
                    };
                }

                let expires_at = now + policy.code_ttl;
                state.expected_code = Some(code.clone());
                state.code_expires_at = Some(expires_at);

                OtpRequestOutcome::Issued(OtpChallenge {
                    expires_in_seconds: seconds_until(expires_at, now),
                    remaining_attempts: state.remaining_attempts,
                    code,
                })
            },
        )?;

        match &outcome {
            OtpRequestOutcome::Issued(challenge) => debug!(
                mobile = %mobile,
                remaining_attempts = challenge.remaining_attempts,
                "OTP issued"
            ),
            OtpRequestOutcome::RateLimited { cooldown_seconds } => debug!(
                mobile = %mobile,
                cooldown_seconds = cooldown_seconds,
                "OTP request during cooldown"
            ),
        }
        Ok(outcome)
    }

    /// Checks a submitted code against the outstanding challenge.
    ///
    /// A missing or expired challenge counts as a wrong code.
    pub fn verify(&self, mobile: &MobileNumber, code: &str) -> Result<OtpVerifyOutcome> {
        let now = self.clock.now();
        let policy = self.policy;

        let outcome = modify(
            self.records.as_ref(),
            mobile.as_str(),
            |slot: &mut Option<OtpAttemptState>| {
                let state = slot
                    .get_or_insert_with(|| OtpAttemptState::fresh(mobile.clone(), policy.max_attempts));
                state.reconcile(now);

                if state.lock_active(now) {
                    return OtpVerifyOutcome::RateLimited {
                        cooldown_seconds: state.cooldown_seconds(now),
                    };
                }

                state.last_attempt_at = Some(now);

                if state.code_matches(code, now) {
                    state.reset_attempts();
                    state.clear_challenge();
                    let user_id = state
                        .user_id
                        .get_or_insert_with(|| Uuid::new_v4().to_string())
                        .clone();
                    return OtpVerifyOutcome::Verified { user_id };
                }

                state.remaining_attempts = state.remaining_attempts.saturating_sub(1);
                if state.remaining_attempts == 0 {
                    state.is_locked = true;
                    state.lock_expires_at = Some(now + policy.cooldown);
                    state.clear_challenge();
                    return OtpVerifyOutcome::RateLimited {
                        cooldown_seconds: state.cooldown_seconds(now),
                    };
                }

                OtpVerifyOutcome::InvalidCode {
                    remaining_attempts: state.remaining_attempts,
                }
            },
        )?;

        match &outcome {
            OtpVerifyOutcome::Verified { user_id } => {
                info!(mobile = %mobile, user_id = %user_id, "OTP verified")
            }
            OtpVerifyOutcome::InvalidCode { remaining_attempts } => debug!(
                mobile = %mobile,
                remaining_attempts = remaining_attempts,
                "OTP mismatch"
            ),
            OtpVerifyOutcome::RateLimited { cooldown_seconds } => warn!(
                mobile = %mobile,
                cooldown_seconds = cooldown_seconds,
                "OTP verification locked"
            ),
        }
        Ok(outcome)
    }

    /// Current attempt state. Never creates a record.
    pub fn status(&self, mobile: &MobileNumber) -> Result<OtpStatus> {
        let now = self.clock.now();
        let max_attempts = self.policy.max_attempts;

        modify(
            self.records.as_ref(),
            mobile.as_str(),
            |slot: &mut Option<OtpAttemptState>| match slot.as_mut() {
                Some(state) => {
                    state.reconcile(now);
                    state.status(now)
                }
                None => OtpAttemptState::fresh(mobile.clone(), max_attempts).status(now),
            },
        )
    }

    /// Physically removes records idle for longer than `grace`.
    pub fn purge_idle(&self, grace: Duration) -> Result<usize> {
        self.records.purge(self.clock.now() - grace)
    }

    /// Number of tracked mobile numbers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
