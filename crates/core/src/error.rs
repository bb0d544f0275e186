//! Unified error types for the wizard state service.
//!
//! Error codes:
//! - SESSION_001-002: Session lookup errors
//! - DRAFT_001-002: Draft persistence errors
//! - OTP_001-002: One-time passcode errors
//! - VALID_001-002: Validation errors
//! - STORE_001: Backing store errors
//!
//! Stores report expected conditions (expiry, lockout, wrong code) as
//! outcome values. These errors only appear once a caller converts an
//! outcome with `into_result()`, or when the backing store itself fails.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Session error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorCode {
    /// SESSION_001: No session with this id
    NotFound,
    /// SESSION_002: Session exists but its TTL has lapsed
    Expired,
}

impl SessionErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "SESSION_001",
            Self::Expired => "SESSION_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Expired => 401,
        }
    }
}

/// Draft error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftErrorCode {
    /// DRAFT_001: No draft for this session
    NotFound,
    /// DRAFT_002: Draft already submitted
    Submitted,
}

impl DraftErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "DRAFT_001",
            Self::Submitted => "DRAFT_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Submitted => 409,
        }
    }
}

/// OTP error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpErrorCode {
    /// OTP_001: Submitted code does not match
    InvalidCode,
    /// OTP_002: Too many failed attempts, cooldown running
    RateLimited,
}

impl OtpErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCode => "OTP_001",
            Self::RateLimited => "OTP_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidCode => 401,
            Self::RateLimited => 429,
        }
    }
}

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Malformed input
    InvalidFormat,
    /// VALID_002: Step payload exceeds size limit
    PayloadTooLarge,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "VALID_001",
            Self::PayloadTooLarge => "VALID_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        400
    }
}

/// Store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// STORE_001: Backing store failed
    Unavailable,
}

impl StoreErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable => "STORE_001",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        500
    }
}

/// Unified error type for the wizard state service.
#[derive(Debug, Error)]
pub enum Error {
    /// No record for the key.
    #[error("[{code}] {message}")]
    NotFound {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Record exists but its time window lapsed.
    #[error("[{code}] {message}")]
    Expired {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Cooldown active.
    #[error("[{code}] {message}")]
    RateLimited {
        code: &'static str,
        message: String,
        http_status: u16,
        retry_after: u64,
    },

    /// Wrong credential, attempts remain.
    #[error("[{code}] {message}")]
    InvalidCredential {
        code: &'static str,
        message: String,
        http_status: u16,
        remaining_attempts: u32,
    },

    /// Write against a frozen record.
    #[error("[{code}] {message}")]
    Conflict {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Malformed input caught before reaching a store.
    #[error("[{code}] {message}")]
    Validation {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Backing store failure.
    #[error("[{code}] {message}")]
    Store {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Session id unknown.
    pub fn session_not_found(session_id: &str) -> Self {
        let code = SessionErrorCode::NotFound;
        Self::NotFound {
            code: code.code(),
            message: format!("Session {} not found", session_id),
            http_status: code.http_status(),
        }
    }

    /// Session TTL lapsed.
    pub fn session_expired(session_id: &str) -> Self {
        let code = SessionErrorCode::Expired;
        Self::Expired {
            code: code.code(),
            message: format!("Session {} has expired", session_id),
            http_status: code.http_status(),
        }
    }

    /// No draft exists and the caller chose not to create one.
    pub fn draft_not_found(session_id: &str) -> Self {
        let code = DraftErrorCode::NotFound;
        Self::NotFound {
            code: code.code(),
            message: format!("No draft for session {}", session_id),
            http_status: code.http_status(),
        }
    }

    /// Write against a submitted draft.
    pub fn draft_submitted(session_id: &str) -> Self {
        let code = DraftErrorCode::Submitted;
        Self::Conflict {
            code: code.code(),
            message: format!("Draft for session {} is already submitted", session_id),
            http_status: code.http_status(),
        }
    }

    /// Wrong OTP. The message carries the remaining attempt count.
    pub fn invalid_otp(remaining_attempts: u32) -> Self {
        let code = OtpErrorCode::InvalidCode;
        Self::InvalidCredential {
            code: code.code(),
            message: format!(
                "Invalid OTP. {} attempt(s) remaining",
                remaining_attempts
            ),
            http_status: code.http_status(),
            remaining_attempts,
        }
    }

    /// OTP cooldown running. The message carries the cooldown.
    pub fn otp_rate_limited(cooldown_seconds: u64) -> Self {
        let code = OtpErrorCode::RateLimited;
        Self::RateLimited {
            code: code.code(),
            message: format!(
                "Too many attempts. Try again in {} seconds",
                cooldown_seconds
            ),
            http_status: code.http_status(),
            retry_after: cooldown_seconds,
        }
    }

    /// Create a validation error with code.
    pub fn validation_code(code: ValidationErrorCode, msg: impl Into<String>) -> Self {
        Self::Validation {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a malformed-input validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::validation_code(ValidationErrorCode::InvalidFormat, msg)
    }

    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        let code = StoreErrorCode::Unavailable;
        Self::Store {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { http_status, .. } => *http_status,
            Self::Expired { http_status, .. } => *http_status,
            Self::RateLimited { http_status, .. } => *http_status,
            Self::InvalidCredential { http_status, .. } => *http_status,
            Self::Conflict { http_status, .. } => *http_status,
            Self::Validation { http_status, .. } => *http_status,
            Self::Store { http_status, .. } => *http_status,
            Self::Serialization(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { code, .. }
            | Self::Expired { code, .. }
            | Self::RateLimited { code, .. }
            | Self::InvalidCredential { code, .. }
            | Self::Conflict { code, .. }
            | Self::Validation { code, .. }
            | Self::Store { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Human-readable message without the code prefix.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound { message, .. }
            | Self::Expired { message, .. }
            | Self::RateLimited { message, .. }
            | Self::InvalidCredential { message, .. }
            | Self::Conflict { message, .. }
            | Self::Validation { message, .. }
            | Self::Store { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Seconds a client should wait before retrying, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}
