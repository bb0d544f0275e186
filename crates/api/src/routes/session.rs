//! Session lifecycle endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::info;
use validator::Validate;
use wizard_core::{SessionExtension, SessionLookup, SessionMode, SessionSnapshot, SessionValidation};

use crate::extractors::ValidatedJson;
use crate::response::{created, ok, ApiError, Envelope};
use crate::state::AppState;

/// Body of `POST /sessions`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub mode: SessionMode,
    /// Recorded for ASSISTED, ignored for SELF
    #[validate(length(min = 1, max = 64))]
    pub staff_id: Option<String>,
}

/// POST /sessions
pub async fn create_session(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Envelope<SessionSnapshot>>), ApiError> {
    let snapshot = state.sessions.create(req.mode, req.staff_id)?;
    metrics().sessions_created.inc();

    info!(
        session_id = %snapshot.session.session_id,
        mode = snapshot.session.mode.as_str(),
        "Session created"
    );

    Ok(created("Session created", snapshot))
}

/// GET /sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Envelope<SessionSnapshot>>, ApiError> {
    let lookup = state.sessions.get(&session_id)?;
    if matches!(lookup, SessionLookup::Expired(_)) {
        metrics().expired_session_reads.inc();
    }

    let snapshot = lookup.into_result(&session_id)?;
    Ok(ok("Session retrieved", snapshot))
}

/// POST /sessions/:id/extend
pub async fn extend_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Envelope<SessionExtension>>, ApiError> {
    let extension = state.sessions.extend(&session_id)?.into_result(&session_id)?;
    metrics().sessions_extended.inc();

    Ok(ok("Session extended", extension))
}

/// DELETE /sessions/:id
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    state.sessions.end(&session_id)?;
    metrics().sessions_ended.inc();

    info!(session_id = %session_id, "Session ended");
    Ok(Json(Envelope::message("Session ended")))
}

/// GET /sessions/:id/validate
pub async fn validate_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Envelope<SessionValidation>>, ApiError> {
    let validation = state.sessions.validate(&session_id)?;
    let message = if validation.is_valid {
        "Session is valid"
    } else {
        "Session is not valid"
    };

    Ok(ok(message, validation))
}
