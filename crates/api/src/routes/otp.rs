//! OTP challenge endpoints.
//!
//! Mobile numbers are normalized before reaching the tracker, so
//! `+8801712345678` and `01712345678` share one attempt budget.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::{debug, info};
use validator::Validate;
use wizard_core::{
    MobileNumber, OtpChallenge, OtpRequestOutcome, OtpStatus, OtpVerification, OtpVerifyOutcome,
};

use crate::extractors::ValidatedJson;
use crate::response::{ok, ApiError, Envelope};
use crate::state::AppState;

/// Body of `POST /otp/request`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequestBody {
    #[validate(length(min = 1, max = 20))]
    pub mobile_number: String,
}

/// Body of `POST /otp/verify`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerifyBody {
    #[validate(length(min = 1, max = 20))]
    pub mobile_number: String,
    #[serde(alias = "otp")]
    #[validate(length(min = 1, max = 12))]
    pub code: String,
}

/// POST /otp/request
pub async fn request_otp(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<OtpRequestBody>,
) -> Result<Json<Envelope<OtpChallenge>>, ApiError> {
    let mobile = MobileNumber::parse(&body.mobile_number)?;

    let outcome = state.otp.request(&mobile)?;
    match &outcome {
        OtpRequestOutcome::Issued(_) => metrics().otp_requested.inc(),
        OtpRequestOutcome::RateLimited { .. } => metrics().otp_rate_limited.inc(),
    }

    let challenge = outcome.into_result()?;
    info!(
        mobile = %mobile,
        expires_in_seconds = challenge.expires_in_seconds,
        "OTP challenge issued"
    );
    if state.log_otp_codes {
        debug!(mobile = %mobile, code = %challenge.code, "OTP code");
    }
    Ok(ok("OTP sent", challenge))
}

/// POST /otp/verify
pub async fn verify_otp(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<OtpVerifyBody>,
) -> Result<Json<Envelope<OtpVerification>>, ApiError> {
    let mobile = MobileNumber::parse(&body.mobile_number)?;

    let outcome = state.otp.verify(&mobile, body.code.trim())?;
    match &outcome {
        OtpVerifyOutcome::Verified { .. } => metrics().otp_verified.inc(),
        OtpVerifyOutcome::InvalidCode { .. } => metrics().otp_failed.inc(),
        OtpVerifyOutcome::RateLimited { .. } => metrics().otp_rate_limited.inc(),
    }

    let verification = outcome.into_result()?;
    Ok(ok("OTP verified", verification))
}

/// GET /otp/status/:mobile
pub async fn otp_status(
    State(state): State<AppState>,
    Path(mobile): Path<String>,
) -> Result<Json<Envelope<OtpStatus>>, ApiError> {
    let mobile = MobileNumber::parse(&mobile)?;
    let status = state.otp.status(&mobile)?;
    Ok(ok("OTP status retrieved", status))
}
