//! OTP challenge and lockout over HTTP.

use axum::http::StatusCode;
use integration_tests::{
    fixtures::{self, OTP_CODE, WRONG_CODE},
    setup::{TestContext, TestOptions},
};
use api::RateLimitConfig;
use serde_json::Value;

#[tokio::test]
async fn test_request_then_verify() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/otp/request")
        .json(&fixtures::otp_request(fixtures::mobile()))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["expiresInSeconds"], 120);
    assert_eq!(body["data"]["remainingAttempts"], 5);
    // The code itself is never echoed back
    assert!(body["data"].get("code").is_none());

    let response = server
        .post("/otp/verify")
        .json(&fixtures::otp_verify(fixtures::mobile(), OTP_CODE))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["verified"], true);
    assert!(body["data"]["userId"].is_string());
}

#[tokio::test]
async fn test_code_logging_keeps_code_out_of_response() {
    let ctx = TestContext::with_options(TestOptions {
        log_otp_codes: true,
        ..TestOptions::default()
    });
    assert!(ctx.state.log_otp_codes);
    let server = ctx.server();

    let response = server
        .post("/otp/request")
        .json(&fixtures::otp_request(fixtures::mobile()))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], 200);
    assert!(body["data"].get("code").is_none());

    server
        .post("/otp/verify")
        .json(&fixtures::otp_verify(fixtures::mobile(), OTP_CODE))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_wrong_code_reports_remaining() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .post("/otp/request")
        .json(&fixtures::otp_request(fixtures::mobile()))
        .await
        .assert_status_ok();

    let response = server
        .post("/otp/verify")
        .json(&fixtures::otp_verify(fixtures::mobile(), WRONG_CODE))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "OTP_001");
    assert!(body["message"].as_str().unwrap().contains('4'));
}

#[tokio::test]
async fn test_five_wrong_codes_lock_the_number() {
    let ctx = TestContext::new();
    let server = ctx.server();

    for _ in 0..4 {
        server
            .post("/otp/verify")
            .json(&fixtures::otp_verify(fixtures::mobile(), WRONG_CODE))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    let response = server
        .post("/otp/verify")
        .json(&fixtures::otp_verify(fixtures::mobile(), WRONG_CODE))
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["code"], "OTP_002");
    assert_eq!(response.header("retry-after"), "30");

    // Requests are refused during cooldown too
    ctx.advance_secs(10);
    let response = server
        .post("/otp/request")
        .json(&fixtures::otp_request(fixtures::mobile()))
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.header("retry-after"), "20");

    let body: Value = server
        .get(&format!("/otp/status/{}", fixtures::mobile()))
        .await
        .json();
    assert_eq!(body["data"]["isLocked"], true);
    assert_eq!(body["data"]["remainingAttempts"], 0);
    assert_eq!(body["data"]["cooldownSeconds"], 20);
}

#[tokio::test]
async fn test_cooldown_elapsed_restores_attempts() {
    let ctx = TestContext::new();
    let server = ctx.server();

    for _ in 0..5 {
        server
            .post("/otp/verify")
            .json(&fixtures::otp_verify(fixtures::mobile(), WRONG_CODE))
            .await;
    }

    ctx.advance_secs(30);

    let body: Value = server
        .get(&format!("/otp/status/{}", fixtures::mobile()))
        .await
        .json();
    assert_eq!(body["data"]["isLocked"], false);
    assert_eq!(body["data"]["remainingAttempts"], 5);
    assert_eq!(body["data"]["cooldownSeconds"], 0);

    server
        .post("/otp/request")
        .json(&fixtures::otp_request(fixtures::mobile()))
        .await
        .assert_status_ok();
    server
        .post("/otp/verify")
        .json(&fixtures::otp_verify(fixtures::mobile(), OTP_CODE))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_success_resets_failures() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .post("/otp/request")
        .json(&fixtures::otp_request(fixtures::mobile()))
        .await;
    for _ in 0..3 {
        server
            .post("/otp/verify")
            .json(&fixtures::otp_verify(fixtures::mobile(), WRONG_CODE))
            .await;
    }
    server
        .post("/otp/verify")
        .json(&fixtures::otp_verify(fixtures::mobile(), OTP_CODE))
        .await
        .assert_status_ok();

    let body: Value = server
        .get(&format!("/otp/status/{}", fixtures::mobile()))
        .await
        .json();
    assert_eq!(body["data"]["remainingAttempts"], 5);
    assert_eq!(body["data"]["isLocked"], false);
}

#[tokio::test]
async fn test_number_formats_share_attempts() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .post("/otp/verify")
        .json(&fixtures::otp_verify(fixtures::mobile_international(), WRONG_CODE))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let body: Value = server
        .get(&format!("/otp/status/{}", fixtures::mobile()))
        .await
        .json();
    assert_eq!(body["data"]["mobileNumber"], fixtures::mobile());
    assert_eq!(body["data"]["remainingAttempts"], 4);
}

#[tokio::test]
async fn test_unseen_number_status() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/otp/status/01812345678").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["remainingAttempts"], 5);
    assert_eq!(body["data"]["maxAttempts"], 5);
    assert_eq!(body["data"]["isLocked"], false);
    assert!(ctx.state.otp.is_empty());
}

#[tokio::test]
async fn test_malformed_number_is_400() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/otp/request")
        .json(&fixtures::otp_request("12345"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALID_001");

    server
        .get("/otp/status/not-a-number")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_throttle_guards_otp_routes() {
    let ctx = TestContext::with_options(TestOptions {
        throttle: RateLimitConfig { rate: 1, burst: 2 },
        ..TestOptions::default()
    });
    let server = ctx.server();

    for _ in 0..2 {
        server
            .get("/otp/status/01712345678")
            .add_header("X-Forwarded-For", "10.0.0.1")
            .await
            .assert_status_ok();
    }

    let response = server
        .get("/otp/status/01712345678")
        .add_header("X-Forwarded-For", "10.0.0.1")
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["code"], "THROTTLE_001");
    assert_eq!(response.header("retry-after"), "1");

    // Other clients and non-OTP routes are unaffected
    server
        .get("/otp/status/01712345678")
        .add_header("X-Forwarded-For", "10.0.0.2")
        .await
        .assert_status_ok();
    server.get("/drafts/anything").await.assert_status_ok();
}
