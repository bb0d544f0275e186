//! Time windows and size limits for the wizard state service.
//!
//! The TTL and cooldown values are the defaults the stores are built with;
//! deployments can override them through configuration.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so field limits are duplicated on the request types in the api crate.
//! Keep both in sync when modifying.

// === Session ===

/// Session time-to-live in seconds (30 minutes).
///
/// Extension resets the window to this value from "now".
pub const SESSION_TTL_SECS: i64 = 1800;

/// Staff identifier max length for assisted sessions.
pub const MAX_STAFF_ID_LEN: usize = 64;

// === OTP ===

/// Verification attempts per challenge cycle.
pub const OTP_MAX_ATTEMPTS: u32 = 5;

/// Lockout after the last failed attempt (seconds).
pub const OTP_COOLDOWN_SECS: i64 = 30;

/// Lifetime of an issued code (seconds).
pub const OTP_CODE_TTL_SECS: i64 = 120;

/// Issued code length in digits.
pub const OTP_CODE_LEN: usize = 6;

/// Bangladeshi mobile number, optionally with the 88 country prefix.
///
/// Capture group 1 is the 11-digit local form.
pub const MOBILE_NUMBER_PATTERN: &str = r"^(?:\+?88)?(01[3-9][0-9]{8})$";

// === Draft ===

/// Highest step number accepted by the wizard.
pub const MAX_STEP_NUMBER: u32 = 64;

/// Step name max length.
pub const MAX_STEP_NAME_LEN: usize = 64;

/// Serialized step payload max size (64KB).
///
/// Payloads are opaque form data; signatures and photos are uploaded
/// elsewhere and only referenced here.
pub const MAX_STEP_PAYLOAD_BYTES: usize = 64 * 1024;
