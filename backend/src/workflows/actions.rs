// Workflow Actions - action results, builders and the collaborators actions talk to

use async_trait::async_trait;
use cadence_shared::{Action, ActionOutcome, ActionType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use super::error::ActionError;

/// Result of executing one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_type: ActionType,
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub attempts: u32,
    pub duration_ms: i64,
}

impl ActionResult {
    pub fn success(action_type: ActionType, output: Option<Value>) -> Self {
        Self {
            action_type,
            success: true,
            output,
            error: None,
            attempts: 1,
            duration_ms: 0,
        }
    }

    pub fn failure(action_type: ActionType, error: &ActionError) -> Self {
        Self {
            action_type,
            success: false,
            output: None,
            error: Some(error.to_string()),
            attempts: 1,
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn to_outcome(&self) -> ActionOutcome {
        ActionOutcome {
            action_type: self.action_type.clone(),
            success: self.success,
            error: self.error.clone(),
            duration_ms: self.duration_ms,
            attempts: self.attempts,
        }
    }
}

// ===== Collaborators =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    /// Either a literal body or the id of a template owned by the email transport
    pub content: EmailContent,
    pub variables: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailContent {
    Body(String),
    Template(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), ActionError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, notification: NewNotification) -> Result<Uuid, ActionError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerRecordStore: Send + Sync {
    async fn update(&self, customer_id: Uuid, patch: Map<String, Value>) -> Result<(), ActionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, ActionError>;
}

// ===== Action Builders =====

pub fn send_email(to: &str, subject: &str, body: &str) -> Action {
    Action::new(
        ActionType::SendEmail,
        json!({ "to": to, "subject": subject, "body": body }),
    )
}

pub fn send_email_template(to: &str, subject: &str, template_id: &str, variables: Value) -> Action {
    Action::new(
        ActionType::SendEmail,
        json!({
            "to": to,
            "subject": subject,
            "templateId": template_id,
            "variables": variables
        }),
    )
}

pub fn create_notification(title: &str, message: &str, notification_type: &str) -> Action {
    Action::new(
        ActionType::CreateNotification,
        json!({
            "title": title,
            "message": message,
            "type": notification_type
        }),
    )
}

pub fn update_customer(customer_id: &str, fields: Value) -> Action {
    Action::new(
        ActionType::UpdateCustomer,
        json!({ "customerId": customer_id, "fields": fields }),
    )
}

pub fn webhook(url: &str, body: Value) -> Action {
    Action::new(
        ActionType::Webhook,
        json!({ "url": url, "method": "POST", "body": body }),
    )
}
