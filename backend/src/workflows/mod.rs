// Workflow Automation Engine
//
// Administrators bind domain events to conditions and actions. When an event
// is triggered, every active workflow for it whose conditions match runs its
// actions in order, and the outcome is appended to the execution log.

pub mod actions;
pub mod conditions;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod presets;
pub mod recorder;
pub mod store;
pub mod template;

pub use actions::{
    CustomerRecordStore, EmailContent, EmailMessage, EmailSender, HttpClient, HttpRequest,
    HttpResponse, NewNotification, NotificationStore,
};
pub use context::EventContext;
pub use engine::WorkflowEngine;
pub use error::{ActionError, WorkflowError, WorkflowResult};
pub use executor::{ActionDispatcher, Collaborators, DispatchLimits};
pub use metrics::MetricsAggregator;
pub use recorder::{ExecutionQuery, ExecutionRecorder, InMemoryExecutionStore, PgExecutionStore};
pub use store::{InMemoryWorkflowRepository, PgWorkflowRepository, WorkflowStore};
