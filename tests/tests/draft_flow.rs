//! Draft persistence over HTTP.

use axum::http::StatusCode;
use integration_tests::{
    fixtures,
    setup::{create_session, TestContext, TestOptions},
};
use serde_json::{json, Value};

#[tokio::test]
async fn test_initialize_draft() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.post("/drafts/s-1").await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["status"], 201);
    assert_eq!(body["data"]["sessionId"], "s-1");
    assert_eq!(body["data"]["draftVersion"], 1);
    assert_eq!(body["data"]["highestCompletedStep"], 0);
    assert_eq!(body["data"]["isSubmitted"], false);
    let application_id = body["data"]["applicationId"].as_str().unwrap();
    assert!(application_id.starts_with("APP-"));
}

#[tokio::test]
async fn test_init_and_two_saves_of_step_one() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server.post("/drafts/s-1").await.assert_status(StatusCode::CREATED);

    for _ in 0..2 {
        server
            .put("/drafts/s-1/steps/1")
            .json(&fixtures::step("personal", fixtures::personal_info(), true))
            .await
            .assert_status_ok();
    }

    let body: Value = server.get("/drafts/s-1").await.json();
    assert_eq!(body["data"]["draftVersion"], 3);
    assert_eq!(body["data"]["highestCompletedStep"], 1);
    assert_eq!(body["data"]["stepVersions"][0]["version"], 2);
    assert_eq!(body["data"]["data"]["1"]["fullName"], "Rahim Uddin");
}

#[tokio::test]
async fn test_save_returns_version_and_timestamp() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .put("/drafts/s-1/steps/2")
        .json(&fixtures::step("address", json!({ "city": "Dhaka" }), false))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["draftVersion"], 2);
    assert!(body["data"]["savedAt"].is_string());
}

#[tokio::test]
async fn test_missing_draft_is_null() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/drafts/unknown").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["data"].is_null());

    let body: Value = server.get("/drafts/unknown/versions").await.json();
    assert_eq!(body["data"], json!([]));

    let body: Value = server.get("/drafts/unknown/steps/1").await.json();
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_step_versions_and_data() {
    let ctx = TestContext::new();
    let server = ctx.server();

    for (n, name) in [(1, "personal"), (2, "address"), (1, "personal")] {
        server
            .put(&format!("/drafts/s-1/steps/{}", n))
            .json(&fixtures::step(name, json!({ "n": n }), n == 1))
            .await
            .assert_status_ok();
    }

    let body: Value = server.get("/drafts/s-1/versions").await.json();
    let versions = body["data"].as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["stepNumber"], 1);
    assert_eq!(versions[0]["version"], 2);
    assert_eq!(versions[1]["stepNumber"], 2);
    assert_eq!(versions[1]["version"], 1);

    let body: Value = server.get("/drafts/s-1/steps/1").await.json();
    assert_eq!(body["data"]["payload"], json!({ "n": 1 }));
    assert_eq!(body["data"]["isComplete"], true);
}

#[tokio::test]
async fn test_clear_then_save_conflicts() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .put("/drafts/s-1/steps/1")
        .json(&fixtures::step("personal", fixtures::personal_info(), true))
        .await
        .assert_status_ok();
    server.delete("/drafts/s-1").await.assert_status_ok();
    let repeat: Value = server.delete("/drafts/s-1").await.json();
    assert_eq!(repeat["status"], 200);

    let before: Value = server.get("/drafts/s-1").await.json();
    assert_eq!(before["data"]["isSubmitted"], true);

    let response = server
        .put("/drafts/s-1/steps/2")
        .json(&fixtures::step("address", json!({}), true))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "DRAFT_002");

    let after: Value = server.get("/drafts/s-1").await.json();
    assert_eq!(before["data"], after["data"]);
}

#[tokio::test]
async fn test_save_without_draft_when_auto_create_disabled() {
    let ctx = TestContext::with_options(TestOptions {
        create_on_save: false,
        ..TestOptions::default()
    });
    let server = ctx.server();

    let response = server
        .put("/drafts/s-1/steps/1")
        .json(&fixtures::step("personal", json!({}), false))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "DRAFT_001");
}

#[tokio::test]
async fn test_reinitialize_discards_unless_resumed() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let first: Value = server.post("/drafts/s-1").await.json();
    server
        .put("/drafts/s-1/steps/1")
        .json(&fixtures::step("personal", json!({}), true))
        .await
        .assert_status_ok();

    let resumed: Value = server.post("/drafts/s-1?resume=true").await.json();
    assert_eq!(
        resumed["data"]["applicationId"],
        first["data"]["applicationId"]
    );
    assert_eq!(resumed["data"]["draftVersion"], 2);

    let fresh: Value = server.post("/drafts/s-1").await.json();
    assert_eq!(fresh["data"]["draftVersion"], 1);
    assert_ne!(fresh["data"]["applicationId"], first["data"]["applicationId"]);
}

#[tokio::test]
async fn test_invalid_step_requests() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .put("/drafts/s-1/steps/0")
        .json(&fixtures::step("personal", json!({}), false))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .put("/drafts/s-1/steps/1")
        .json(&fixtures::step("", json!({}), false))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALID_001");

    let response = server
        .put("/drafts/s-1/steps/1")
        .json(&fixtures::step("blob", fixtures::oversized_payload(), false))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALID_002");

    let body: Value = server.get("/drafts/s-1").await.json();
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_live_session_policy() {
    let ctx = TestContext::with_options(TestOptions {
        require_live_session: true,
        ..TestOptions::default()
    });
    let server = ctx.server();

    let response = server.post("/drafts/ghost").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "SESSION_001");

    let session_id = create_session(&server).await;
    server
        .post(&format!("/drafts/{}", session_id))
        .await
        .assert_status(StatusCode::CREATED);

    ctx.advance_secs(1800);
    let response = server
        .put(&format!("/drafts/{}/steps/1", session_id))
        .json(&fixtures::step("personal", json!({}), true))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "SESSION_002");

    // Reads are not gated
    server
        .get(&format!("/drafts/{}", session_id))
        .await
        .assert_status_ok();
}
