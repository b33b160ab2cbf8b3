use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::tests::fixtures::*;
use crate::tests::helpers::{TestApp, API};
use crate::workflows::EmailContent;

async fn trigger(app: &TestApp, event_type: &str, context: serde_json::Value) -> serde_json::Value {
    let (status, body) = app
        .post(
            &format!("{}/trigger", API),
            json!({"eventType": event_type, "context": context}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "trigger failed: {}", body);
    body
}

#[tokio::test]
async fn test_consultation_booking_runs_both_actions() {
    let app = TestApp::new().await;
    let (_, workflow) = app.post(&format!("{}/workflows", API), consultation_workflow()).await;
    let customer = customer();

    let response = trigger(&app, "APPOINTMENT_CREATED", consultation_context(&customer)).await;

    assert_eq!(response["success"], true);
    assert_eq!(response["triggeredWorkflowIds"], json!([workflow["id"]]));
    assert_eq!(response["executedActionsCount"], 2);
    assert_eq!(response["errors"], json!([]));

    let sent = app.emails.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, customer.email);
    assert_eq!(sent[0].subject, "See you on 2024-05-01");
    assert_eq!(sent[0].content, EmailContent::Body(format!("Hello {}", customer.first_name)));

    let notifications = app.notifications.all().await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(
        notifications[0].1.message,
        format!("{} {} booked 2024-05-01", customer.first_name, customer.last_name)
    );

    let uri = format!("{}/workflows/{}/executions", API, workflow["id"].as_str().unwrap());
    let (status, history) = app.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["meta"]["total"], 1);
    assert_eq!(history["data"][0]["status"], "success");
    assert_eq!(history["data"][0]["triggerId"], response["triggerId"]);
}

#[tokio::test]
async fn test_non_matching_event_runs_nothing() {
    let app = TestApp::new().await;
    app.post(&format!("{}/workflows", API), consultation_workflow()).await;
    let customer = customer();

    let mut context = consultation_context(&customer);
    context["appointment"]["type"] = json!("follow-up");
    let response = trigger(&app, "APPOINTMENT_CREATED", context).await;

    assert_eq!(response["success"], true);
    assert_eq!(response["triggeredWorkflowIds"], json!([]));
    assert_eq!(response["executedActionsCount"], 0);
    assert!(app.emails.sent().await.is_empty());
}

#[tokio::test]
async fn test_trigger_rejects_unknown_event_type() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(&format!("{}/trigger", API), json!({"eventType": "INVOICE_PAID", "context": {}}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"]["eventType"].is_array());

    let (status, _) = app.post(&format!("{}/trigger", API), json!({"context": {}})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_payment_threshold_and_customer_update() {
    let app = TestApp::new().await;
    let customer = customer();
    app.customers
        .insert(customer.id, json!({"email": customer.email, "status": "new"}))
        .await;

    app.post(
        &format!("{}/workflows", API),
        json!({
            "name": "Large payment",
            "eventType": "PAYMENT_RECEIVED",
            "conditions": [{"field": "payment.amount", "operator": "greater_than", "value": 1000}],
            "actions": [{
                "type": "update_customer",
                "config": {"customerId": "{{customer.id}}", "fields": {"status": "vip"}}
            }]
        }),
    )
    .await;

    let small = trigger(&app, "PAYMENT_RECEIVED", payment_context(&customer, &PaymentFixture::with_amount(999))).await;
    assert_eq!(small["executedActionsCount"], 0);
    assert_eq!(app.customers.get(customer.id).await.unwrap()["status"], "new");

    let large = trigger(&app, "PAYMENT_RECEIVED", payment_context(&customer, &PaymentFixture::with_amount(1500))).await;
    assert_eq!(large["executedActionsCount"], 1);
    assert_eq!(app.customers.get(customer.id).await.unwrap()["status"], "vip");
}

#[tokio::test]
async fn test_failed_action_is_reported_and_others_continue() {
    let app = TestApp::new().await;
    let (_, workflow) = app
        .post(
            &format!("{}/workflows", API),
            json!({
                "name": "Mixed",
                "eventType": "CUSTOMER_CREATED",
                "actions": [
                    {"type": "send_sms", "config": {}},
                    {"type": "create_notification", "config": {"title": "Welcome", "message": "{{customer.email}}"}}
                ]
            }),
        )
        .await;

    let response = trigger(&app, "CUSTOMER_CREATED", json!({"customer": customer().to_json()})).await;

    assert_eq!(response["success"], true);
    assert_eq!(response["executedActionsCount"], 1);
    assert_eq!(response["errors"], json!(["Mixed: send_sms: unsupported action type"]));
    assert_eq!(app.notifications.all().await.len(), 1);

    let (_, metrics) = app
        .get(&format!("{}/workflows/{}/metrics", API, workflow["id"].as_str().unwrap()))
        .await;
    assert_eq!(metrics["totalExecutions"], 1);
    assert_eq!(metrics["successfulExecutions"], 0);
    assert_eq!(metrics["failedExecutions"], 1);
}

#[tokio::test]
async fn test_webhook_delivery() {
    let app = TestApp::new().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/payment-failed"))
        .and(body_json(json!({"event": "payment_failed", "amount": "42"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    app.post(
        &format!("{}/workflows", API),
        json!({
            "name": "Tell accounting",
            "eventType": "PAYMENT_FAILED",
            "actions": [{
                "type": "webhook",
                "config": {
                    "url": format!("{}/hooks/payment-failed", server.uri()),
                    "body": {"event": "payment_failed", "amount": "{{payment.amount}}"}
                }
            }]
        }),
    )
    .await;

    let payment = PaymentFixture::with_amount(42);
    let response = trigger(&app, "PAYMENT_FAILED", payment_context(&customer(), &payment)).await;

    assert_eq!(response["executedActionsCount"], 1);
    assert_eq!(response["errors"], json!([]));
}

#[tokio::test]
async fn test_webhook_error_status_counts_as_failure() {
    let app = TestApp::new().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    app.post(
        &format!("{}/workflows", API),
        json!({
            "name": "Flaky hook",
            "eventType": "CONTACT_FORM_SUBMITTED",
            "actions": [{"type": "webhook", "config": {"url": server.uri()}}]
        }),
    )
    .await;

    let response = trigger(&app, "CONTACT_FORM_SUBMITTED", json!({})).await;

    assert_eq!(response["executedActionsCount"], 0);
    assert_eq!(
        response["errors"],
        json!(["Flaky hook: webhook: webhook failed: endpoint responded with status 503"])
    );
}

#[tokio::test]
async fn test_stats_follow_executions() {
    let app = TestApp::new().await;

    let (status, empty) = app.get(&format!("{}/stats", API)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["totalExecutions"], 0);
    assert_eq!(empty["successRate"], 100.0);

    app.post(&format!("{}/workflows", API), consultation_workflow()).await;
    trigger(&app, "APPOINTMENT_CREATED", consultation_context(&customer())).await;

    let (_, stats) = app.get(&format!("{}/stats", API)).await;
    assert_eq!(stats["totalWorkflows"], 1);
    assert_eq!(stats["activeWorkflows"], 1);
    assert_eq!(stats["totalExecutions"], 1);
    assert_eq!(stats["successfulExecutions"], 1);
    assert_eq!(stats["byEventType"]["APPOINTMENT_CREATED"]["executions"], 1);
    assert_eq!(stats["byActionType"]["send_email"]["successes"], 1);
}

#[tokio::test]
async fn test_execution_history_pages() {
    let app = TestApp::new().await;
    let (_, workflow) = app.post(&format!("{}/workflows", API), consultation_workflow()).await;
    let customer = customer();
    for _ in 0..3 {
        trigger(&app, "APPOINTMENT_CREATED", consultation_context(&customer)).await;
    }

    let uri = format!("{}/workflows/{}/executions", API, workflow["id"].as_str().unwrap());

    let (_, first) = app.get(&format!("{}?page=1&perPage=2", uri)).await;
    assert_eq!(first["data"].as_array().unwrap().len(), 2);
    assert_eq!(first["meta"]["total"], 3);
    assert_eq!(first["meta"]["totalPages"], 2);
    assert_eq!(first["meta"]["hasNext"], true);

    let (_, second) = app.get(&format!("{}?page=2&perPage=2", uri)).await;
    assert_eq!(second["data"].as_array().unwrap().len(), 1);
    assert_eq!(second["meta"]["hasPrev"], true);

    let (_, clamped) = app.get(&format!("{}?perPage=1000", uri)).await;
    assert_eq!(clamped["meta"]["perPage"], 100);
}

#[tokio::test]
async fn test_history_page_far_past_the_end_is_empty() {
    let app = TestApp::new().await;
    let (_, workflow) = app.post(&format!("{}/workflows", API), consultation_workflow()).await;
    trigger(&app, "APPOINTMENT_CREATED", consultation_context(&customer())).await;

    let uri = format!(
        "{}/workflows/{}/executions?page={}",
        API,
        workflow["id"].as_str().unwrap(),
        i64::MAX
    );
    let (status, history) = app.get(&uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["data"], json!([]));
    assert_eq!(history["meta"]["page"], i64::MAX);
    assert_eq!(history["meta"]["total"], 1);
    assert_eq!(history["meta"]["totalPages"], 1);
    assert_eq!(history["meta"]["hasNext"], false);
    assert_eq!(history["meta"]["hasPrev"], true);
}

#[tokio::test]
async fn test_dry_run_previews_without_side_effects() {
    let app = TestApp::new().await;
    let (_, workflow) = app.post(&format!("{}/workflows", API), consultation_workflow()).await;
    let customer = customer();
    let uri = format!("{}/workflows/{}/dry-run", API, workflow["id"].as_str().unwrap());

    let (status, preview) = app
        .post(&uri, json!({"context": consultation_context(&customer)}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["matches"], true);
    assert_eq!(preview["actions"][0]["type"], "send_email");
    assert_eq!(preview["actions"][0]["config"]["to"], customer.email.as_str());

    let (status, empty) = app.post(&uri, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["matches"], false);

    assert!(app.emails.sent().await.is_empty());
    let (_, history) = app
        .get(&format!("{}/workflows/{}/executions", API, workflow["id"].as_str().unwrap()))
        .await;
    assert_eq!(history["meta"]["total"], 0);
}
