use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use crate::tests::fixtures::*;
use crate::tests::helpers::{TestApp, API};

#[tokio::test]
async fn test_create_and_get_workflow() {
    let app = TestApp::new().await;

    let (status, created) = app.post(&format!("{}/workflows", API), consultation_workflow()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["eventType"], "APPOINTMENT_CREATED");
    assert_eq!(created["isActive"], true);
    assert_eq!(created["actions"].as_array().unwrap().len(), 2);

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = app.get(&format!("{}/workflows/{}", API, id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_create_reports_every_invalid_field() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            &format!("{}/workflows", API),
            json!({"name": "  ", "eventType": "APPOINTMENT_RESCHEDULED", "actions": []}),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(body["details"]["name"].is_array());
    assert!(body["details"]["eventType"].is_array());
    assert!(body["details"]["actions"].is_array());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_malformed_body_is_a_validation_error() {
    let app = TestApp::new().await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri(format!("{}/workflows", API))
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"]["body"].is_array());
}

#[tokio::test]
async fn test_unbounded_retry_is_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            &format!("{}/workflows", API),
            json!({
                "name": "Hammer the mail server",
                "eventType": "CUSTOMER_CREATED",
                "actions": [{
                    "type": "send_email",
                    "config": {"to": "{{customer.email}}"},
                    "retry": {"maxAttempts": 4294967295u32, "delayMs": 86400000}
                }]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"]["retry"].is_array());

    let (_, all) = app.get(&format!("{}/workflows", API)).await;
    assert_eq!(all, json!([]));
}

#[tokio::test]
async fn test_unknown_action_type_is_accepted() {
    let app = TestApp::new().await;

    let (status, created) = app
        .post(
            &format!("{}/workflows", API),
            json!({
                "name": "Text the customer",
                "eventType": "APPOINTMENT_CREATED",
                "actions": [{"type": "send_sms", "config": {"to": "{{customer.phone}}"}}]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["actions"][0]["type"], "send_sms");
}

#[tokio::test]
async fn test_update_merges_and_revalidates() {
    let app = TestApp::new().await;
    let (_, created) = app.post(&format!("{}/workflows", API), consultation_workflow()).await;
    let uri = format!("{}/workflows/{}", API, created["id"].as_str().unwrap());

    let (status, updated) = app
        .request("PUT", &uri, Some(json!({"isActive": false, "name": "Consultations"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["isActive"], false);
    assert_eq!(updated["name"], "Consultations");
    assert_eq!(updated["conditions"], created["conditions"]);
    assert_eq!(updated["createdAt"], created["createdAt"]);

    let (status, _) = app.request("PUT", &uri, Some(json!({"actions": []}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_missing_workflow_is_not_found() {
    let app = TestApp::new().await;
    let uri = format!("{}/workflows/{}", API, Uuid::new_v4());

    let (status, body) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");

    let (status, _) = app.request("PUT", &uri, Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.request("DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get(&format!("{}/metrics", uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_workflow() {
    let app = TestApp::new().await;
    let (_, created) = app.post(&format!("{}/workflows", API), consultation_workflow()).await;
    let uri = format!("{}/workflows/{}", API, created["id"].as_str().unwrap());

    let (status, body) = app.request("DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_filters() {
    let app = TestApp::new().await;
    app.post(
        &format!("{}/workflows", API),
        notification_workflow("Paid", "PAYMENT_RECEIVED", json!([])),
    )
    .await;
    let (_, failed) = app
        .post(
            &format!("{}/workflows", API),
            notification_workflow("Failed", "PAYMENT_FAILED", json!([])),
        )
        .await;
    app.request(
        "PUT",
        &format!("{}/workflows/{}", API, failed["id"].as_str().unwrap()),
        Some(json!({"isActive": false})),
    )
    .await;

    let (_, all) = app.get(&format!("{}/workflows", API)).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    // newest first
    assert_eq!(all[0]["name"], "Failed");

    let (_, active) = app.get(&format!("{}/workflows?isActive=true", API)).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
    assert_eq!(active[0]["name"], "Paid");

    let (_, by_event) = app.get(&format!("{}/workflows?eventType=PAYMENT_FAILED", API)).await;
    assert_eq!(by_event.as_array().unwrap().len(), 1);
    assert_eq!(by_event[0]["name"], "Failed");

    let (status, _) = app.get(&format!("{}/workflows?eventType=NOPE", API)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_event_types_and_templates() {
    let app = TestApp::new().await;

    let (status, event_types) = app.get(&format!("{}/event-types", API)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event_types.as_array().unwrap().len(), 10);
    assert!(event_types
        .as_array()
        .unwrap()
        .iter()
        .any(|info| info["eventType"] == "SCHEDULED_MAINTENANCE"));

    let (status, templates) = app.get(&format!("{}/templates", API)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(templates.as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn test_instantiate_template_creates_inactive_workflow() {
    let app = TestApp::new().await;

    let (status, workflow) = app
        .post(&format!("{}/templates/consultation-booked", API), json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(workflow["isActive"], false);
    assert_eq!(workflow["eventType"], "APPOINTMENT_CREATED");

    let (status, body) = app
        .post(&format!("{}/templates/does-not-exist", API), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Template 'does-not-exist' not found");
}

#[tokio::test]
async fn test_health_reports_memory_storage() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"], "memory");
}
