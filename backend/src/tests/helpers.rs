use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::Mutex;
use tower::ServiceExt;

use crate::config::EngineConfig;
use crate::services::{InMemoryCustomerRecordStore, InMemoryNotificationStore, ReqwestHttpClient};
use crate::workflows::{
    ActionError, Collaborators, EmailMessage, EmailSender, InMemoryExecutionStore, InMemoryWorkflowRepository,
};
use crate::AppState;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("cadence_backend=debug")
            .try_init()
            .ok();
    });
}

/// Email sender that keeps every message for later assertions.
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailSender {
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), ActionError> {
        self.sent.lock().await.push(message);
        Ok(())
    }
}

/// A fully wired in-memory application plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub emails: Arc<RecordingEmailSender>,
    pub notifications: Arc<InMemoryNotificationStore>,
    pub customers: Arc<InMemoryCustomerRecordStore>,
}

impl TestApp {
    pub async fn new() -> Self {
        init_test_logging();

        let emails = Arc::new(RecordingEmailSender::default());
        let notifications = Arc::new(InMemoryNotificationStore::new());
        let customers = Arc::new(InMemoryCustomerRecordStore::new());

        let config = EngineConfig {
            action_timeout: Duration::from_secs(2),
            webhook_timeout: Duration::from_secs(1),
            stats_cache_ttl: Duration::ZERO,
        };

        let state = Arc::new(
            AppState::assemble(
                Arc::new(InMemoryWorkflowRepository::new()),
                Arc::new(InMemoryExecutionStore::new()),
                Collaborators {
                    email: emails.clone(),
                    notifications: notifications.clone(),
                    customers: customers.clone(),
                    http: Arc::new(ReqwestHttpClient::new()),
                },
                &config,
                None,
            )
            .await
            .expect("in-memory state assembles"),
        );

        Self {
            router: crate::app(state.clone(), &[]),
            state,
            emails,
            notifications,
            customers,
        }
    }

    /// Send a request and decode the JSON response (Null for an empty body).
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body)).await
    }
}

pub const API: &str = "/api/v1/automation";
