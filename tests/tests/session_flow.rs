//! Session lifecycle over HTTP.

use axum::http::StatusCode;
use integration_tests::{
    fixtures,
    setup::{create_session, TestContext},
};
use serde_json::Value;

#[tokio::test]
async fn test_create_self_session() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.post("/sessions").json(&fixtures::self_session()).await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["status"], 201);
    assert_eq!(body["data"]["mode"], "SELF");
    assert_eq!(body["data"]["isActive"], true);
    assert_eq!(body["data"]["ttlSecondsRemaining"], 1800);
    assert!(body["data"].get("staffId").is_none());
}

#[tokio::test]
async fn test_new_session_validates() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let session_id = create_session(&server).await;

    let response = server
        .get(&format!("/sessions/{}/validate", session_id))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["isValid"], true);
    let ttl = body["data"]["ttlSecondsRemaining"].as_u64().unwrap();
    assert!(ttl > 1799 && ttl <= 1800, "ttl was {}", ttl);
}

#[tokio::test]
async fn test_sessions_are_distinct() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let a = create_session(&server).await;
    let b = create_session(&server).await;
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_assisted_session_with_and_without_staff_id() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/sessions")
        .json(&serde_json::json!({ "mode": "ASSISTED" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["mode"], "ASSISTED");
    assert!(body["data"].get("staffId").is_none());

    let response = server
        .post("/sessions")
        .json(&fixtures::assisted_session("staff-042"))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["mode"], "ASSISTED");
    assert_eq!(body["data"]["staffId"], "staff-042");
}

#[tokio::test]
async fn test_unknown_mode_is_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/sessions")
        .json(&serde_json::json!({ "mode": "KIOSK" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["status"], 400);
    assert_eq!(body["code"], "VALID_001");
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/sessions/does-not-exist").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["status"], 404);
    assert_eq!(body["code"], "SESSION_001");
}

#[tokio::test]
async fn test_expired_session_is_401_not_404() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let session_id = create_session(&server).await;

    ctx.advance_secs(1800);

    let response = server.get(&format!("/sessions/{}", session_id)).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "SESSION_002");

    let response = server
        .get(&format!("/sessions/{}/validate", session_id))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], 200);
    assert_eq!(body["data"]["isValid"], false);
    assert_eq!(body["data"]["ttlSecondsRemaining"], 0);
}

#[tokio::test]
async fn test_extend_resets_full_ttl() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let session_id = create_session(&server).await;

    ctx.advance_secs(1000);

    let response = server
        .post(&format!("/sessions/{}/extend", session_id))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["newTtlSeconds"], 1800);
    assert!(body["data"]["newExpiresAt"].is_string());
}

#[tokio::test]
async fn test_extend_revives_expired_session() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let session_id = create_session(&server).await;

    ctx.advance_secs(2000);
    server
        .get(&format!("/sessions/{}", session_id))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .post(&format!("/sessions/{}/extend", session_id))
        .await
        .assert_status_ok();

    let response = server.get(&format!("/sessions/{}", session_id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["isActive"], true);
}

#[tokio::test]
async fn test_extend_unknown_session_is_404() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.post("/sessions/nope/extend").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "SESSION_001");
}

#[tokio::test]
async fn test_end_session_is_idempotent() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let session_id = create_session(&server).await;

    server
        .delete(&format!("/sessions/{}", session_id))
        .await
        .assert_status_ok();
    server
        .delete(&format!("/sessions/{}", session_id))
        .await
        .assert_status_ok();

    server
        .get(&format!("/sessions/{}", session_id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_store_outage_is_500() {
    let ctx = TestContext::new();
    let server = ctx.server();

    ctx.set_store_failure(true);

    let response = server.post("/sessions").json(&fixtures::self_session()).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "STORE_001");

    ctx.set_store_failure(false);
    server
        .post("/sessions")
        .json(&fixtures::self_session())
        .await
        .assert_status(StatusCode::CREATED);
}
