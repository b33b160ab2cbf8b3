// Workflow engine errors

use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced synchronously by store mutations.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Validation failed: {}", summarize(.0))]
    Validation(BTreeMap<String, Vec<String>>),
    #[error("Workflow {0} not found")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt stored record: {0}")]
    Corrupt(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

fn summarize(details: &BTreeMap<String, Vec<String>>) -> String {
    details
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collects per-field validation messages.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    details: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.details
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn into_error(self) -> WorkflowError {
        WorkflowError::Validation(self.details)
    }

    pub fn into_result(self) -> WorkflowResult<()> {
        if self.details.is_empty() {
            Ok(())
        } else {
            Err(self.into_error())
        }
    }
}

/// Failure of a single action. Never leaves the dispatcher; it is folded into
/// the action's result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("{service} failed: {message}")]
    Collaborator { service: &'static str, message: String },
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("action handler panicked")]
    Panicked,
    #[error("unsupported action type")]
    Unsupported,
}

impl ActionError {
    pub fn collaborator(service: &'static str, message: impl ToString) -> Self {
        ActionError::Collaborator {
            service,
            message: message.to_string(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        ActionError::InvalidConfig(message.into())
    }
}
