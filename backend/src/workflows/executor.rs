// Workflow Executor - renders action configs and dispatches them to their handlers

use cadence_shared::{Action, ActionType};
use futures::FutureExt;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use super::actions::{
    ActionResult, CustomerRecordStore, EmailContent, EmailMessage, EmailSender, HttpClient,
    HttpRequest, NewNotification, NotificationStore,
};
use super::context::EventContext;
use super::error::ActionError;
use super::template;

const WEBHOOK_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// External services the action handlers call.
#[derive(Clone)]
pub struct Collaborators {
    pub email: Arc<dyn EmailSender>,
    pub notifications: Arc<dyn NotificationStore>,
    pub customers: Arc<dyn CustomerRecordStore>,
    pub http: Arc<dyn HttpClient>,
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchLimits {
    /// Upper bound on one handler attempt
    pub action_timeout: Duration,
    /// Request deadline used when a webhook config does not set `timeoutMs`
    pub webhook_timeout: Duration,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(30),
            webhook_timeout: Duration::from_secs(10),
        }
    }
}

pub struct ActionDispatcher {
    collaborators: Collaborators,
    limits: DispatchLimits,
}

impl ActionDispatcher {
    pub fn new(collaborators: Collaborators, limits: DispatchLimits) -> Self {
        Self {
            collaborators,
            limits,
        }
    }

    /// Execute a single action. Always returns a result; handler errors,
    /// panics and timeouts become a failed `ActionResult`.
    pub async fn execute(&self, action: &Action, context: &EventContext) -> ActionResult {
        let start = Instant::now();
        let action_type = &action.action_type;
        let config = template::render(&action.config, context);

        // Rows written before retry bounds were enforced are clamped here too.
        let (max_attempts, retry_delay) = match action.retry {
            Some(policy) => {
                let (attempts, delay_ms) = policy.bounded();
                (attempts, Duration::from_millis(delay_ms))
            }
            None => (1, Duration::ZERO),
        };

        debug!("Executing action {}", action_type);

        let mut attempts = 0;
        let outcome = loop {
            attempts += 1;
            match self.attempt(action_type, &config).await {
                Ok(output) => break Ok(output),
                Err(e) if attempts < max_attempts && is_retryable(&e) => {
                    warn!(
                        "Action {} failed, retrying ({}/{}): {}",
                        action_type, attempts, max_attempts, e
                    );
                    tokio::time::sleep(retry_delay).await;
                }
                Err(e) => break Err(e),
            }
        };

        let duration = start.elapsed().as_millis() as i64;

        let result = match outcome {
            Ok(output) => ActionResult::success(action_type.clone(), output),
            Err(e) => {
                warn!("Action {} failed after {} attempt(s): {}", action_type, attempts, e);
                ActionResult::failure(action_type.clone(), &e)
            }
        };

        result.with_duration(duration).with_attempts(attempts)
    }

    async fn attempt(&self, action_type: &ActionType, config: &Value) -> Result<Option<Value>, ActionError> {
        let limit = self.limits.action_timeout;
        let handler = AssertUnwindSafe(self.handle(action_type, config)).catch_unwind();

        match tokio::time::timeout(limit, handler).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ActionError::Panicked),
            Err(_) => Err(ActionError::Timeout(limit)),
        }
    }

    async fn handle(&self, action_type: &ActionType, config: &Value) -> Result<Option<Value>, ActionError> {
        match action_type {
            ActionType::SendEmail => self.send_email(config).await,
            ActionType::CreateNotification => self.create_notification(config).await,
            ActionType::UpdateCustomer => self.update_customer(config).await,
            ActionType::Webhook => self.call_webhook(config).await,
            ActionType::Unsupported(_) => Err(ActionError::Unsupported),
        }
    }

    // ===== Action Implementations =====

    async fn send_email(&self, config: &Value) -> Result<Option<Value>, ActionError> {
        let to = required_str(config, "to")?;
        let subject = optional_str(config, "subject").unwrap_or_default();

        let content = match optional_str(config, "templateId") {
            Some(template_id) => EmailContent::Template(template_id),
            None => EmailContent::Body(optional_str(config, "body").unwrap_or_default()),
        };

        let variables = config
            .get("variables")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        self.collaborators
            .email
            .send(EmailMessage {
                to: to.clone(),
                subject,
                content,
                variables,
            })
            .await?;

        Ok(Some(json!({ "to": to })))
    }

    async fn create_notification(&self, config: &Value) -> Result<Option<Value>, ActionError> {
        let notification = NewNotification {
            user_id: optional_uuid(config, "userId")?,
            title: required_str(config, "title")?,
            message: optional_str(config, "message").unwrap_or_default(),
            notification_type: optional_str(config, "type").unwrap_or_else(|| "workflow".to_string()),
            entity_type: optional_str(config, "entityType"),
            entity_id: optional_uuid(config, "entityId")?,
        };

        let notification_id = self.collaborators.notifications.create(notification).await?;

        Ok(Some(json!({ "notificationId": notification_id })))
    }

    async fn update_customer(&self, config: &Value) -> Result<Option<Value>, ActionError> {
        let customer_id = optional_uuid(config, "customerId")?
            .ok_or_else(|| ActionError::invalid_config("'customerId' is required"))?;

        let fields = match config.get("fields") {
            Some(Value::Object(fields)) if !fields.is_empty() => fields.clone(),
            _ => return Err(ActionError::invalid_config("'fields' must be a non-empty object")),
        };

        let updated: Vec<String> = fields.keys().cloned().collect();
        self.collaborators.customers.update(customer_id, fields).await?;

        Ok(Some(json!({ "customerId": customer_id, "updatedFields": updated })))
    }

    async fn call_webhook(&self, config: &Value) -> Result<Option<Value>, ActionError> {
        let url = required_str(config, "url")?;
        let parsed = url::Url::parse(&url)
            .map_err(|e| ActionError::invalid_config(format!("invalid url '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ActionError::invalid_config(format!(
                "unsupported url scheme '{}'",
                parsed.scheme()
            )));
        }

        let method = optional_str(config, "method")
            .map(|m| m.to_ascii_uppercase())
            .unwrap_or_else(|| "POST".to_string());
        if !WEBHOOK_METHODS.contains(&method.as_str()) {
            return Err(ActionError::invalid_config(format!("unsupported method '{}'", method)));
        }

        let headers: BTreeMap<String, String> = match config.get("headers") {
            Some(Value::Object(headers)) => headers
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    (name.clone(), value)
                })
                .collect(),
            _ => BTreeMap::new(),
        };

        let timeout = config
            .get("timeoutMs")
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
            .unwrap_or(self.limits.webhook_timeout)
            .min(self.limits.action_timeout);

        let response = self
            .collaborators
            .http
            .request(HttpRequest {
                url: parsed.to_string(),
                method,
                headers,
                body: config.get("body").cloned(),
                timeout,
            })
            .await?;

        if !response.is_success() {
            return Err(ActionError::collaborator(
                "webhook",
                format!("endpoint responded with status {}", response.status),
            ));
        }

        Ok(Some(json!({ "status": response.status, "body": response.body })))
    }
}

/// Bad configuration fails the same way every time.
fn is_retryable(error: &ActionError) -> bool {
    !matches!(error, ActionError::InvalidConfig(_) | ActionError::Unsupported)
}

fn optional_str(config: &Value, key: &str) -> Option<String> {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn required_str(config: &Value, key: &str) -> Result<String, ActionError> {
    optional_str(config, key).ok_or_else(|| ActionError::invalid_config(format!("'{}' is required", key)))
}

fn optional_uuid(config: &Value, key: &str) -> Result<Option<Uuid>, ActionError> {
    optional_str(config, key)
        .map(|raw| {
            Uuid::parse_str(&raw)
                .map_err(|_| ActionError::invalid_config(format!("'{}' is not a valid id: {}", key, raw)))
        })
        .transpose()
}
