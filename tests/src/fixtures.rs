//! Test fixtures and request bodies.

use serde_json::{json, Value};

/// Code issued by the fixed code source in tests.
pub const OTP_CODE: &str = "123456";

/// A code that never matches.
pub const WRONG_CODE: &str = "000000";

/// A valid mobile number in local form.
pub fn mobile() -> &'static str {
    "01712345678"
}

/// The same number with the country prefix.
pub fn mobile_international() -> &'static str {
    "+8801712345678"
}

pub fn self_session() -> Value {
    json!({ "mode": "SELF" })
}

pub fn assisted_session(staff_id: &str) -> Value {
    json!({ "mode": "ASSISTED", "staffId": staff_id })
}

/// Body for `PUT /drafts/:sessionId/steps/:n`.
pub fn step(name: &str, payload: Value, is_complete: bool) -> Value {
    json!({
        "stepName": name,
        "payload": payload,
        "isComplete": is_complete,
    })
}

/// Personal details form as the wizard would send it.
pub fn personal_info() -> Value {
    json!({
        "fullName": "Rahim Uddin",
        "dateOfBirth": "1990-04-12",
        "nid": "1990123456789",
    })
}

/// A step payload over the 64KB limit.
pub fn oversized_payload() -> Value {
    json!({ "blob": "x".repeat(70_000) })
}

pub fn otp_request(mobile: &str) -> Value {
    json!({ "mobileNumber": mobile })
}

pub fn otp_verify(mobile: &str, code: &str) -> Value {
    json!({ "mobileNumber": mobile, "code": code })
}
