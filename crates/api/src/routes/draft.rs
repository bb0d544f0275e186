//! Draft persistence endpoints.
//!
//! Draft writes check the owning session only when the live-session policy
//! is enabled; reads never do.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use telemetry::metrics;
use tracing::{info, warn};
use validator::Validate;
use wizard_core::{
    limits::MAX_STEP_NUMBER, validate_payload_size, Draft, SaveOutcome, SaveReceipt, StepData,
    StepSave, StepVersion,
};

use crate::extractors::ValidatedJson;
use crate::response::{created, ok, ApiError, Envelope};
use crate::state::AppState;

/// Query of `POST /drafts/:sessionId`.
#[derive(Debug, Default, Deserialize)]
pub struct InitializeQuery {
    /// Keep existing progress instead of starting over
    #[serde(default)]
    pub resume: bool,
}

/// Body of `PUT /drafts/:sessionId/steps/:n`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveStepRequest {
    #[validate(length(min = 1, max = 64))]
    pub step_name: String,
    pub payload: Value,
    #[serde(default)]
    pub is_complete: bool,
}

fn parse_step(raw: &str) -> Result<u32, ApiError> {
    match raw.parse::<u32>() {
        Ok(n) if (1..=MAX_STEP_NUMBER).contains(&n) => Ok(n),
        _ => Err(ApiError::bad_request(format!(
            "step must be an integer between 1 and {}",
            MAX_STEP_NUMBER
        ))),
    }
}

/// POST /drafts/:sessionId
pub async fn initialize_draft(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<InitializeQuery>,
) -> Result<(StatusCode, Json<Envelope<Draft>>), ApiError> {
    state.ensure_live_session(&session_id)?;

    let draft = if query.resume {
        state.drafts.get_or_initialize(&session_id)?
    } else {
        state.drafts.initialize(&session_id)?
    };
    metrics().drafts_initialized.inc();

    info!(
        session_id = %session_id,
        application_id = %draft.application_id,
        resume = query.resume,
        "Draft initialized"
    );
    Ok(created("Draft initialized", draft))
}

/// GET /drafts/:sessionId
pub async fn get_draft(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Envelope<Option<Draft>>>, ApiError> {
    let draft = state.drafts.get(&session_id)?;
    let message = if draft.is_some() {
        "Draft retrieved"
    } else {
        "No draft found"
    };
    Ok(ok(message, draft))
}

/// PUT /drafts/:sessionId/steps/:n
pub async fn save_step(
    State(state): State<AppState>,
    Path((session_id, step)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<SaveStepRequest>,
) -> Result<Json<Envelope<SaveReceipt>>, ApiError> {
    let step_number = parse_step(&step)?;
    validate_payload_size(&req.payload)?;
    state.ensure_live_session(&session_id)?;

    let outcome = state.drafts.save_step(
        &session_id,
        StepSave {
            step_number,
            step_name: req.step_name,
            payload: req.payload,
            is_complete: req.is_complete,
        },
    )?;

    match &outcome {
        SaveOutcome::Saved(_) => metrics().draft_steps_saved.inc(),
        SaveOutcome::Submitted => {
            metrics().draft_save_conflicts.inc();
            warn!(session_id = %session_id, step = step_number, "Save against submitted draft");
        }
        SaveOutcome::NotFound => {}
    }

    let receipt = outcome.into_result(&session_id)?;
    Ok(ok("Step saved", receipt))
}

/// DELETE /drafts/:sessionId
pub async fn clear_draft(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    if state.drafts.clear(&session_id)? {
        metrics().drafts_submitted.inc();
        info!(session_id = %session_id, "Draft cleared");
    }

    Ok(Json(Envelope::message("Draft cleared")))
}

/// GET /drafts/:sessionId/versions
pub async fn get_step_versions(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Envelope<Vec<StepVersion>>>, ApiError> {
    let versions = state.drafts.step_versions(&session_id)?;
    Ok(ok("Step versions retrieved", versions))
}

/// GET /drafts/:sessionId/steps/:n
pub async fn get_step_data(
    State(state): State<AppState>,
    Path((session_id, step)): Path<(String, String)>,
) -> Result<Json<Envelope<Option<StepData>>>, ApiError> {
    let step_number = parse_step(&step)?;
    let data = state.drafts.step_data(&session_id, step_number)?;
    let message = if data.is_some() {
        "Step data retrieved"
    } else {
        "No data for step"
    };
    Ok(ok(message, data))
}
