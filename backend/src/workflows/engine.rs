// Workflow Engine - matches events against active workflows and runs their actions

use cadence_shared::{
    DryRunResponse, EventType, ExecutionRecord, ExecutionStatus, RenderedAction, TriggerResponse,
    WorkflowDefinition,
};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::conditions;
use super::context::EventContext;
use super::error::WorkflowResult;
use super::executor::ActionDispatcher;
use super::recorder::ExecutionRecorder;
use super::store::WorkflowStore;
use super::template;

/// Outcome of running one matched workflow
struct WorkflowRun {
    actions_executed: usize,
    errors: Vec<String>,
}

pub struct WorkflowEngine {
    store: Arc<WorkflowStore>,
    dispatcher: Arc<ActionDispatcher>,
    recorder: Arc<ExecutionRecorder>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<WorkflowStore>,
        dispatcher: Arc<ActionDispatcher>,
        recorder: Arc<ExecutionRecorder>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            recorder,
        }
    }

    /// Run every active workflow for `event_type` whose conditions match.
    ///
    /// Always completes with `success: true`; action and audit-log failures
    /// are reported in `errors` and never abort other work.
    pub async fn trigger(&self, event_type: EventType, context: EventContext) -> TriggerResponse {
        let trigger_id = Uuid::new_v4();
        let snapshot = self.store.find_active_by_event_type(event_type).await;
        let candidates = snapshot.len();

        let matched: Vec<WorkflowDefinition> = snapshot
            .into_iter()
            .filter(|workflow| conditions::matches(&workflow.conditions, &context))
            .collect();

        info!(
            "Trigger {} for {}: {} of {} active workflows matched",
            trigger_id,
            event_type,
            matched.len(),
            candidates
        );

        let runs = join_all(
            matched
                .iter()
                .map(|workflow| self.run_workflow(trigger_id, workflow, &context)),
        )
        .await;

        let mut executed_actions_count = 0;
        let mut errors = Vec::new();
        for run in runs {
            executed_actions_count += run.actions_executed;
            errors.extend(run.errors);
        }

        if !errors.is_empty() {
            warn!("Trigger {} finished with {} error(s)", trigger_id, errors.len());
        }

        TriggerResponse {
            success: true,
            trigger_id,
            triggered_workflow_ids: matched.iter().map(|workflow| workflow.id).collect(),
            executed_actions_count,
            errors,
        }
    }

    /// Evaluate one workflow against a sample context without running or recording anything.
    pub async fn dry_run(&self, workflow_id: Uuid, context: EventContext) -> WorkflowResult<DryRunResponse> {
        let workflow = self.store.get(workflow_id).await?;

        Ok(DryRunResponse {
            workflow_id,
            matches: conditions::matches(&workflow.conditions, &context),
            actions: workflow
                .actions
                .iter()
                .map(|action| RenderedAction {
                    action_type: action.action_type.clone(),
                    config: template::render(&action.config, &context),
                })
                .collect(),
        })
    }

    async fn run_workflow(
        &self,
        trigger_id: Uuid,
        workflow: &WorkflowDefinition,
        context: &EventContext,
    ) -> WorkflowRun {
        let triggered_at = Utc::now();
        let start = Instant::now();
        let mut outcomes = Vec::with_capacity(workflow.actions.len());
        let mut errors = Vec::new();

        for action in &workflow.actions {
            let result = self.dispatcher.execute(action, context).await;
            if !result.success {
                errors.push(format!(
                    "{}: {}: {}",
                    workflow.name,
                    result.action_type,
                    result.error.as_deref().unwrap_or("unknown error")
                ));
            }
            outcomes.push(result.to_outcome());
        }

        let record = ExecutionRecord {
            id: Uuid::new_v4(),
            trigger_id,
            workflow_id: workflow.id,
            workflow_name: workflow.name.clone(),
            event_type: workflow.event_type,
            triggered_at,
            status: ExecutionStatus::from_outcomes(&outcomes),
            total_duration_ms: start.elapsed().as_millis() as i64,
            action_results: outcomes,
        };

        info!(
            "Workflow '{}' ({}) finished: {}",
            workflow.name, workflow.id, record.status
        );

        if let Err(e) = self.recorder.record(&record).await {
            error!("Failed to record execution of workflow {}: {}", workflow.id, e);
            errors.push(format!("{}: audit log: {}", workflow.name, e));
        }

        WorkflowRun {
            actions_executed: record.action_results.len(),
            errors,
        }
    }
}
