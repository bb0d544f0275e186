//! Versioned draft persistence keyed by session.
//!
//! Every accepted step save bumps the draft-wide version by exactly one and
//! the saved step's own version by one. Retried saves are not deduplicated:
//! an identical save sent twice advances both counters twice.
//!
//! Whether the owning session is still live is not checked here; that is a
//! caller policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Error, Result, ValidationErrorCode};
use crate::limits::MAX_STEP_PAYLOAD_BYTES;
use crate::store::{modify, KeyedStore, Retention};

/// Save history of one wizard step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepVersion {
    pub step_number: u32,
    pub step_name: String,
    /// 1 on first save, +1 on each re-save
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub is_complete: bool,
}

/// Accumulated wizard progress for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub session_id: String,
    /// Generated once when the draft is created
    pub application_id: String,
    pub current_step: u32,
    /// High-water mark of steps saved with `is_complete`
    pub highest_completed_step: u32,
    pub draft_version: u64,
    /// Insertion ordered, at most one entry per step number
    pub step_versions: Vec<StepVersion>,
    /// Step number -> last saved payload
    pub data: BTreeMap<u32, Value>,
    pub created_at: DateTime<Utc>,
    pub last_saved_at: DateTime<Utc>,
    pub is_submitted: bool,
}

impl Draft {
    /// A zeroed draft: version 1, no steps saved.
    pub fn new(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            application_id: generate_application_id(),
            current_step: 1,
            highest_completed_step: 0,
            draft_version: 1,
            step_versions: Vec::new(),
            data: BTreeMap::new(),
            created_at: now,
            last_saved_at: now,
            is_submitted: false,
        }
    }

    /// Returns the version entry for a step, if it was ever saved.
    pub fn step(&self, step_number: u32) -> Option<&StepVersion> {
        self.step_versions
            .iter()
            .find(|s| s.step_number == step_number)
    }

    /// Applies one step save. The caller has already rejected submitted drafts.
    fn apply(&mut self, save: StepSave, now: DateTime<Utc>) -> SaveReceipt {
        let step_version = match self
            .step_versions
            .iter_mut()
            .find(|s| s.step_number == save.step_number)
        {
            Some(existing) => {
                existing.version += 1;
                existing.step_name = save.step_name;
                existing.saved_at = now;
                existing.is_complete = save.is_complete;
                existing.version
            }
            None => {
                self.step_versions.push(StepVersion {
                    step_number: save.step_number,
                    step_name: save.step_name,
                    version: 1,
                    saved_at: now,
                    is_complete: save.is_complete,
                });
                1
            }
        };

        self.data.insert(save.step_number, save.payload);
        self.current_step = save.step_number;
        self.draft_version += 1;
        if save.is_complete && save.step_number > self.highest_completed_step {
            self.highest_completed_step = save.step_number;
        }
        self.last_saved_at = now;

        SaveReceipt {
            draft_version: self.draft_version,
            step_version,
            saved_at: now,
        }
    }
}

impl Retention for Draft {
    fn retain_until(&self) -> Option<DateTime<Utc>> {
        // Drafts persist until cleared.
        None
    }
}

/// `APP-` followed by 12 uppercase hex characters.
fn generate_application_id() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("APP-{}", &hex[..12])
}

/// One step save request.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSave {
    pub step_number: u32,
    pub step_name: String,
    pub payload: Value,
    pub is_complete: bool,
}

/// Acknowledgement of an accepted save.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub draft_version: u64,
    pub step_version: u32,
    pub saved_at: DateTime<Utc>,
}

/// Result of `DraftStore::save_step`.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(SaveReceipt),
    /// No draft and create-on-save is disabled.
    NotFound,
    /// Draft already submitted; nothing was applied.
    Submitted,
}

impl SaveOutcome {
    pub fn into_result(self, session_id: &str) -> Result<SaveReceipt> {
        match self {
            Self::Saved(receipt) => Ok(receipt),
            Self::NotFound => Err(Error::draft_not_found(session_id)),
            Self::Submitted => Err(Error::draft_submitted(session_id)),
        }
    }
}

/// Last saved payload of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepData {
    pub payload: Value,
    pub is_complete: bool,
}

/// Rejects step payloads over the size limit before they reach the store.
pub fn validate_payload_size(payload: &Value) -> Result<()> {
    let size = serde_json::to_vec(payload)?.len();
    if size > MAX_STEP_PAYLOAD_BYTES {
        return Err(Error::validation_code(
            ValidationErrorCode::PayloadTooLarge,
            format!(
                "step payload {}KB exceeds {}KB limit",
                size / 1024,
                MAX_STEP_PAYLOAD_BYTES / 1024
            ),
        ));
    }
    Ok(())
}

/// Owns draft records.
pub struct DraftStore {
    records: Arc<dyn KeyedStore<Draft>>,
    clock: Arc<dyn Clock>,
    create_on_save: bool,
}

impl DraftStore {
    pub fn new(records: Arc<dyn KeyedStore<Draft>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records,
            clock,
            create_on_save: true,
        }
    }

    /// Whether a save against a missing draft creates one (default) or
    /// reports `NotFound`.
    pub fn with_create_on_save(mut self, create_on_save: bool) -> Self {
        self.create_on_save = create_on_save;
        self
    }

    /// Starts a fresh draft, discarding any existing progress for the session.
    pub fn initialize(&self, session_id: &str) -> Result<Draft> {
        let draft = Draft::new(session_id, self.clock.now());
        let stored = draft.clone();
        let replaced = modify(
            self.records.as_ref(),
            session_id,
            move |slot: &mut Option<Draft>| slot.replace(stored).is_some(),
        )?;

        debug!(
            session_id = %session_id,
            application_id = %draft.application_id,
            replaced = replaced,
            "Draft initialized"
        );
        Ok(draft)
    }

    /// Returns the existing draft, creating one only if none exists.
    pub fn get_or_initialize(&self, session_id: &str) -> Result<Draft> {
        let now = self.clock.now();
        modify(
            self.records.as_ref(),
            session_id,
            |slot: &mut Option<Draft>| {
                slot.get_or_insert_with(|| Draft::new(session_id, now))
                    .clone()
            },
        )
    }

    pub fn get(&self, session_id: &str) -> Result<Option<Draft>> {
        self.records.get(session_id)
    }

    /// Saves one step's payload.
    pub fn save_step(&self, session_id: &str, save: StepSave) -> Result<SaveOutcome> {
        let now = self.clock.now();
        let create_on_save = self.create_on_save;
        let step_number = save.step_number;

        let outcome = modify(
            self.records.as_ref(),
            session_id,
            |slot: &mut Option<Draft>| {
                if slot.is_none() {
                    if !create_on_save {
                        return SaveOutcome::NotFound;
                    }
                    debug!(session_id = %session_id, "Creating draft on first save");
                    *slot = Some(Draft::new(session_id, now));
                }

                match slot.as_mut() {
                    Some(draft) if draft.is_submitted => SaveOutcome::Submitted,
                    Some(draft) => SaveOutcome::Saved(draft.apply(save, now)),
                    None => SaveOutcome::NotFound,
                }
            },
        )?;

        match &outcome {
            SaveOutcome::Saved(receipt) => debug!(
                session_id = %session_id,
                step = step_number,
                draft_version = receipt.draft_version,
                step_version = receipt.step_version,
                "Draft step saved"
            ),
            SaveOutcome::Submitted => debug!(
                session_id = %session_id,
                step = step_number,
                "Rejected save against submitted draft"
            ),
            SaveOutcome::NotFound => {}
        }
        Ok(outcome)
    }

    /// Marks the draft submitted. The record is kept; no-op when absent.
    ///
    /// Returns `true` only when this call moved the draft into the
    /// submitted state.
    pub fn clear(&self, session_id: &str) -> Result<bool> {
        let marked = modify(
            self.records.as_ref(),
            session_id,
            |slot: &mut Option<Draft>| match slot.as_mut() {
                Some(draft) if !draft.is_submitted => {
                    draft.is_submitted = true;
                    true
                }
                _ => false,
            },
        )?;

        if marked {
            debug!(session_id = %session_id, "Draft submitted");
        }
        Ok(marked)
    }

    /// Step history in first-saved order. Empty when there is no draft.
    pub fn step_versions(&self, session_id: &str) -> Result<Vec<StepVersion>> {
        Ok(self
            .records
            .get(session_id)?
            .map(|draft| draft.step_versions)
            .unwrap_or_default())
    }

    pub fn step_data(&self, session_id: &str, step_number: u32) -> Result<Option<StepData>> {
        let Some(draft) = self.records.get(session_id)? else {
            return Ok(None);
        };

        let is_complete = draft
            .step(step_number)
            .map(|s| s.is_complete)
            .unwrap_or(false);

        Ok(draft.data.get(&step_number).map(|payload| StepData {
            payload: payload.clone(),
            is_complete,
        }))
    }

    /// Number of drafts held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
