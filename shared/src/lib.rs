use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Domain events a workflow can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    AppointmentCreated,
    AppointmentUpdated,
    AppointmentCancelled,
    AppointmentCompleted,
    PaymentReceived,
    PaymentFailed,
    CustomerCreated,
    CustomerUpdated,
    RequestSubmitted,
    ScheduledMaintenance,
}

impl EventType {
    pub const ALL: [EventType; 10] = [
        EventType::AppointmentCreated,
        EventType::AppointmentUpdated,
        EventType::AppointmentCancelled,
        EventType::AppointmentCompleted,
        EventType::PaymentReceived,
        EventType::PaymentFailed,
        EventType::CustomerCreated,
        EventType::CustomerUpdated,
        EventType::RequestSubmitted,
        EventType::ScheduledMaintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AppointmentCreated => "APPOINTMENT_CREATED",
            EventType::AppointmentUpdated => "APPOINTMENT_UPDATED",
            EventType::AppointmentCancelled => "APPOINTMENT_CANCELLED",
            EventType::AppointmentCompleted => "APPOINTMENT_COMPLETED",
            EventType::PaymentReceived => "PAYMENT_RECEIVED",
            EventType::PaymentFailed => "PAYMENT_FAILED",
            EventType::CustomerCreated => "CUSTOMER_CREATED",
            EventType::CustomerUpdated => "CUSTOMER_UPDATED",
            EventType::RequestSubmitted => "REQUEST_SUBMITTED",
            EventType::ScheduledMaintenance => "SCHEDULED_MAINTENANCE",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EventType::AppointmentCreated => "Appointment created",
            EventType::AppointmentUpdated => "Appointment updated",
            EventType::AppointmentCancelled => "Appointment cancelled",
            EventType::AppointmentCompleted => "Appointment completed",
            EventType::PaymentReceived => "Payment received",
            EventType::PaymentFailed => "Payment failed",
            EventType::CustomerCreated => "Customer created",
            EventType::CustomerUpdated => "Customer updated",
            EventType::RequestSubmitted => "Request submitted",
            EventType::ScheduledMaintenance => "Scheduled maintenance",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType(pub String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type '{}'", self.0)
    }
}

impl std::error::Error for UnknownEventType {}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        EventType::ALL
            .iter()
            .copied()
            .find(|event_type| event_type.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Known event type as listed by the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeInfo {
    pub event_type: EventType,
    pub display_name: String,
}

impl From<EventType> for EventTypeInfo {
    fn from(event_type: EventType) -> Self {
        Self {
            event_type,
            display_name: event_type.display_name().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    In,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "not_equals",
            ConditionOperator::GreaterThan => "greater_than",
            ConditionOperator::LessThan => "less_than",
            ConditionOperator::Contains => "contains",
            ConditionOperator::In => "in",
        }
    }
}

/// A single comparison against a dot path into the event context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ConditionOperator::Equals, value.into())
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ConditionOperator::NotEquals, value.into())
    }

    pub fn greater_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ConditionOperator::GreaterThan, value.into())
    }

    pub fn less_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ConditionOperator::LessThan, value.into())
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ConditionOperator::Contains, value.into())
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, ConditionOperator::In, Value::Array(values))
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Action kinds. Names that are not recognised survive a round trip as
/// `Unsupported` so stored definitions never fail to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    SendEmail,
    CreateNotification,
    UpdateCustomer,
    Webhook,
    Unsupported(String),
}

impl ActionType {
    pub const SUPPORTED: [ActionType; 4] = [
        ActionType::SendEmail,
        ActionType::CreateNotification,
        ActionType::UpdateCustomer,
        ActionType::Webhook,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ActionType::SendEmail => "send_email",
            ActionType::CreateNotification => "create_notification",
            ActionType::UpdateCustomer => "update_customer",
            ActionType::Webhook => "webhook",
            ActionType::Unsupported(kind) => kind,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ActionType::Unsupported(_))
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ActionType {
    fn from(kind: &str) -> Self {
        match kind {
            "send_email" => ActionType::SendEmail,
            "create_notification" => ActionType::CreateNotification,
            "update_customer" => ActionType::UpdateCustomer,
            "webhook" => ActionType::Webhook,
            other => ActionType::Unsupported(other.to_string()),
        }
    }
}

impl From<String> for ActionType {
    fn from(kind: String) -> Self {
        ActionType::from(kind.as_str())
    }
}

impl From<ActionType> for String {
    fn from(action_type: ActionType) -> Self {
        action_type.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}

impl RetryPolicy {
    pub const MAX_ATTEMPTS: u32 = 5;
    pub const MAX_DELAY_MS: u64 = 60_000;

    pub fn is_within_bounds(&self) -> bool {
        (1..=Self::MAX_ATTEMPTS).contains(&self.max_attempts) && self.delay_ms <= Self::MAX_DELAY_MS
    }

    /// Attempts and delay with both values forced into the allowed range.
    pub fn bounded(&self) -> (u32, u64) {
        (
            self.max_attempts.clamp(1, Self::MAX_ATTEMPTS),
            self.delay_ms.min(Self::MAX_DELAY_MS),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default = "empty_config")]
    pub config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

fn empty_config() -> Value {
    Value::Object(Map::new())
}

impl Action {
    pub fn new(action_type: ActionType, config: Value) -> Self {
        Self {
            action_type,
            config,
            retry: None,
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, delay_ms: u64) -> Self {
        self.retry = Some(RetryPolicy {
            max_attempts,
            delay_ms,
        });
        self
    }
}

// ---------------------------------------------------------------------------
// Workflow definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub event_type: EventType,
    pub is_active: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of a create call. Fields are loose so that missing values surface
/// as validation errors instead of decode errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_type: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

fn default_active() -> bool {
    true
}

/// Field-level patch; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkflowRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub event_type: Option<String>,
    pub is_active: Option<bool>,
    pub conditions: Option<Vec<Condition>>,
    pub actions: Option<Vec<Action>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowFilter {
    pub is_active: Option<bool>,
    pub event_type: Option<EventType>,
}

impl WorkflowFilter {
    pub fn active_for(event_type: EventType) -> Self {
        Self {
            is_active: Some(true),
            event_type: Some(event_type),
        }
    }

    pub fn accepts(&self, workflow: &WorkflowDefinition) -> bool {
        self.is_active.is_none_or(|active| workflow.is_active == active)
            && self.event_type.is_none_or(|event_type| workflow.event_type == event_type)
    }
}

/// Starter rule offered to administrators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplate {
    pub key: String,
    pub name: String,
    pub description: String,
    pub event_type: EventType,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

impl WorkflowTemplate {
    /// Templates are instantiated inactive so an admin can review them first.
    pub fn to_request(&self) -> CreateWorkflowRequest {
        CreateWorkflowRequest {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            event_type: self.event_type.as_str().to_string(),
            is_active: false,
            conditions: self.conditions.clone(),
            actions: self.actions.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Triggers and execution records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub success: bool,
    pub trigger_id: Uuid,
    pub triggered_workflow_ids: Vec<Uuid>,
    pub executed_actions_count: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunRequest {
    #[serde(default)]
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunResponse {
    pub workflow_id: Uuid,
    pub matches: bool,
    pub actions: Vec<RenderedAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Partial,
    Failed,
}

impl ExecutionStatus {
    /// `Failed` only when every action failed; an empty action list counts as success.
    pub fn from_outcomes(outcomes: &[ActionOutcome]) -> Self {
        let failures = outcomes.iter().filter(|outcome| !outcome.success).count();
        if failures == 0 {
            ExecutionStatus::Success
        } else if failures == outcomes.len() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Partial => "partial",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ExecutionStatus::Success),
            "partial" => Ok(ExecutionStatus::Partial),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("unknown execution status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: i64,
    #[serde(default = "default_max_attempts")]
    pub attempts: u32,
}

/// One matched workflow's outcome for one trigger call. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub trigger_id: Uuid,
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub event_type: EventType,
    pub triggered_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub action_results: Vec<ActionOutcome>,
    pub total_duration_ms: i64,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeBreakdown {
    pub workflows: u64,
    pub executions: u64,
    pub successful_executions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTypeBreakdown {
    pub executions: u64,
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStats {
    pub total_workflows: u64,
    pub active_workflows: u64,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub partial_executions: u64,
    pub failed_executions: u64,
    pub success_rate: f64,
    pub by_event_type: BTreeMap<EventType, EventTypeBreakdown>,
    pub by_action_type: BTreeMap<String, ActionTypeBreakdown>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetrics {
    pub workflow_id: Uuid,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub average_execution_time: f64,
    pub last_executed: Option<DateTime<Utc>>,
}
