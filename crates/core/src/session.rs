//! Session identity and sliding expiry.
//!
//! Expiry is passive: nothing evicts a session when its TTL lapses. A lookup
//! after `expires_at` reports `Expired` and flips `is_active`, but the record
//! stays until `end` or the retention sweeper removes it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clock::{seconds_until, Clock};
use crate::error::{Error, Result};
use crate::limits::SESSION_TTL_SECS;
use crate::store::{modify, KeyedStore, Retention};

/// Who is driving the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    /// Applicant fills the form on their own device.
    #[serde(rename = "SELF")]
    SelfService,
    /// A staff member fills the form on the applicant's behalf.
    #[serde(rename = "ASSISTED")]
    Assisted,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfService => "SELF",
            Self::Assisted => "ASSISTED",
        }
    }
}

/// A wizard session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session ID
    pub session_id: String,
    pub mode: SessionMode,
    /// Present only for assisted sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Last observed liveness; refreshed on lookup
    pub is_active: bool,
}

impl Session {
    /// Seconds left before the session expires, never negative.
    pub fn ttl_seconds_remaining(&self, now: DateTime<Utc>) -> u64 {
        seconds_until(self.expires_at, now)
    }

    /// Checks whether the session is live at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl Retention for Session {
    fn retain_until(&self) -> Option<DateTime<Utc>> {
        Some(self.expires_at)
    }
}

/// A session together with its remaining TTL at the time of the read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub session: Session,
    pub ttl_seconds_remaining: u64,
}

impl SessionSnapshot {
    fn at(session: Session, now: DateTime<Utc>) -> Self {
        let ttl_seconds_remaining = session.ttl_seconds_remaining(now);
        Self {
            session,
            ttl_seconds_remaining,
        }
    }
}

/// Result of `SessionStore::get`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionLookup {
    Active(SessionSnapshot),
    /// Record still exists but its TTL has lapsed.
    Expired(SessionSnapshot),
    NotFound,
}

impl SessionLookup {
    /// Maps `Expired` and `NotFound` onto their coded errors.
    pub fn into_result(self, session_id: &str) -> Result<SessionSnapshot> {
        match self {
            Self::Active(snapshot) => Ok(snapshot),
            Self::Expired(_) => Err(Error::session_expired(session_id)),
            Self::NotFound => Err(Error::session_not_found(session_id)),
        }
    }
}

/// New expiry after an extension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExtension {
    pub new_expires_at: DateTime<Utc>,
    pub new_ttl_seconds: u64,
}

/// Result of `SessionStore::extend`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtendOutcome {
    Extended(SessionExtension),
    NotFound,
}

impl ExtendOutcome {
    pub fn into_result(self, session_id: &str) -> Result<SessionExtension> {
        match self {
            Self::Extended(ext) => Ok(ext),
            Self::NotFound => Err(Error::session_not_found(session_id)),
        }
    }
}

/// Result of `SessionStore::validate`. Never an error for a missing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionValidation {
    pub is_valid: bool,
    pub ttl_seconds_remaining: u64,
}

/// Owns session records.
pub struct SessionStore {
    records: Arc<dyn KeyedStore<Session>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(records: Arc<dyn KeyedStore<Session>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records,
            clock,
            ttl: Duration::seconds(SESSION_TTL_SECS),
        }
    }

    /// Overrides the session TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mints a new session. Each call creates a distinct identity.
    ///
    /// `staff_id` is only kept for assisted sessions.
    pub fn create(&self, mode: SessionMode, staff_id: Option<String>) -> Result<SessionSnapshot> {
        let now = self.clock.now();
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            mode,
            staff_id: match mode {
                SessionMode::Assisted => staff_id,
                SessionMode::SelfService => None,
            },
            created_at: now,
            expires_at: now + self.ttl,
            is_active: true,
        };

        let stored = session.clone();
        modify(self.records.as_ref(), &session.session_id, move |slot: &mut Option<Session>| {
            *slot = Some(stored)
        })?;

        debug!(
            session_id = %session.session_id,
            mode = session.mode.as_str(),
            "Session created"
        );
        Ok(SessionSnapshot::at(session, now))
    }

    /// Looks a session up, marking it inactive if its TTL has lapsed.
    pub fn get(&self, session_id: &str) -> Result<SessionLookup> {
        let now = self.clock.now();
        modify(self.records.as_ref(), session_id, |slot: &mut Option<Session>| {
            let Some(session) = slot.as_mut() else {
                return SessionLookup::NotFound;
            };

            if session.is_live_at(now) {
                SessionLookup::Active(SessionSnapshot::at(session.clone(), now))
            } else {
                if session.is_active {
                    debug!(session_id = %session_id, "Session expired");
                }
                session.is_active = false;
                SessionLookup::Expired(SessionSnapshot::at(session.clone(), now))
            }
        })
    }

    /// Resets the expiry to a full TTL from now.
    ///
    /// Succeeds for any session still physically present, including one
    /// whose TTL already lapsed.
    pub fn extend(&self, session_id: &str) -> Result<ExtendOutcome> {
        let now = self.clock.now();
        let ttl = self.ttl;
        let outcome = modify(self.records.as_ref(), session_id, |slot: &mut Option<Session>| {
            let Some(session) = slot.as_mut() else {
                return ExtendOutcome::NotFound;
            };

            session.expires_at = now + ttl;
            session.is_active = true;
            ExtendOutcome::Extended(SessionExtension {
                new_expires_at: session.expires_at,
                new_ttl_seconds: session.ttl_seconds_remaining(now),
            })
        })?;

        if let ExtendOutcome::Extended(ext) = &outcome {
            debug!(session_id = %session_id, expires_at = %ext.new_expires_at, "Session extended");
        }
        Ok(outcome)
    }

    /// Deletes a session. Ending an unknown session is not an error.
    pub fn end(&self, session_id: &str) -> Result<()> {
        if self.records.remove(session_id)? {
            debug!(session_id = %session_id, "Session ended");
        }
        Ok(())
    }

    /// Reports liveness without failing for unknown sessions.
    pub fn validate(&self, session_id: &str) -> Result<SessionValidation> {
        let now = self.clock.now();
        let validation = match self.records.get(session_id)? {
            Some(session) if session.is_live_at(now) => SessionValidation {
                is_valid: true,
                ttl_seconds_remaining: session.ttl_seconds_remaining(now),
            },
            _ => SessionValidation {
                is_valid: false,
                ttl_seconds_remaining: 0,
            },
        };
        Ok(validation)
    }

    /// Physically removes sessions that expired more than `grace` ago.
    pub fn purge_expired(&self, grace: Duration) -> Result<usize> {
        self.records.purge(self.clock.now() - grace)
    }

    /// Number of session records held, live or expired.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
