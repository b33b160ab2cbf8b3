// Workflow Metrics - statistics derived from the execution log

use cadence_shared::{
    ActionTypeBreakdown, EventTypeBreakdown, ExecutionRecord, ExecutionStatus, WorkflowDefinition,
    WorkflowFilter, WorkflowMetrics, WorkflowStats,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::error::WorkflowResult;
use super::recorder::ExecutionRecorder;
use super::store::WorkflowStore;

/// Aggregates stats over the execution log. The summary is cached for
/// `cache_ttl` and dropped as soon as a workflow is written or an execution is
/// recorded; a zero TTL recomputes on every call.
pub struct MetricsAggregator {
    store: Arc<WorkflowStore>,
    recorder: Arc<ExecutionRecorder>,
    cache_ttl: Duration,
    cached: RwLock<Option<CachedStats>>,
}

struct CachedStats {
    computed_at: Instant,
    /// (store revision, recorder append count) the summary was built from
    source: (u64, u64),
    stats: WorkflowStats,
}

impl MetricsAggregator {
    pub fn new(store: Arc<WorkflowStore>, recorder: Arc<ExecutionRecorder>, cache_ttl: Duration) -> Self {
        Self {
            store,
            recorder,
            cache_ttl,
            cached: RwLock::new(None),
        }
    }

    pub async fn stats(&self) -> WorkflowResult<WorkflowStats> {
        // Read before aggregating so a concurrent write leaves the entry stale.
        let source = (self.store.revision(), self.recorder.appended());

        if !self.cache_ttl.is_zero() {
            if let Some(cached) = self.cached.read().await.as_ref() {
                if cached.source == source && cached.computed_at.elapsed() < self.cache_ttl {
                    return Ok(cached.stats.clone());
                }
            }
        }

        let workflows = self.store.list(&WorkflowFilter::default()).await?;
        let records = self.recorder.records(None).await?;
        let stats = summarize(&workflows, &records);
        debug!(
            "Computed workflow stats over {} executions",
            stats.total_executions
        );

        if !self.cache_ttl.is_zero() {
            *self.cached.write().await = Some(CachedStats {
                computed_at: Instant::now(),
                source,
                stats: stats.clone(),
            });
        }
        Ok(stats)
    }

    pub async fn workflow_metrics(&self, workflow_id: Uuid) -> WorkflowResult<WorkflowMetrics> {
        let records = self.recorder.records(Some(workflow_id)).await?;
        Ok(workflow_metrics(workflow_id, &records))
    }
}

/// 100 when nothing has run yet.
pub fn success_rate(successful: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (successful as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

pub fn summarize(workflows: &[WorkflowDefinition], records: &[ExecutionRecord]) -> WorkflowStats {
    let mut by_event_type = BTreeMap::new();
    let mut by_action_type: BTreeMap<String, ActionTypeBreakdown> = BTreeMap::new();

    for workflow in workflows {
        by_event_type
            .entry(workflow.event_type)
            .or_insert_with(EventTypeBreakdown::default)
            .workflows += 1;
    }

    let mut successful = 0;
    let mut partial = 0;
    let mut failed = 0;

    for record in records {
        let breakdown = by_event_type
            .entry(record.event_type)
            .or_insert_with(EventTypeBreakdown::default);
        breakdown.executions += 1;

        match record.status {
            ExecutionStatus::Success => {
                successful += 1;
                breakdown.successful_executions += 1;
            }
            ExecutionStatus::Partial => partial += 1,
            ExecutionStatus::Failed => failed += 1,
        }

        for outcome in &record.action_results {
            let action = by_action_type
                .entry(outcome.action_type.as_str().to_string())
                .or_default();
            action.executions += 1;
            if outcome.success {
                action.successes += 1;
            } else {
                action.failures += 1;
            }
        }
    }

    let total_executions = records.len() as u64;

    WorkflowStats {
        total_workflows: workflows.len() as u64,
        active_workflows: workflows.iter().filter(|workflow| workflow.is_active).count() as u64,
        total_executions,
        successful_executions: successful,
        partial_executions: partial,
        failed_executions: failed,
        success_rate: success_rate(successful, total_executions),
        by_event_type,
        by_action_type,
        generated_at: Utc::now(),
    }
}

/// Partial runs count as failed here: anything short of full success.
pub fn workflow_metrics(workflow_id: Uuid, records: &[ExecutionRecord]) -> WorkflowMetrics {
    let relevant: Vec<&ExecutionRecord> = records
        .iter()
        .filter(|record| record.workflow_id == workflow_id)
        .collect();

    let total = relevant.len() as u64;
    let successful = relevant
        .iter()
        .filter(|record| record.status == ExecutionStatus::Success)
        .count() as u64;
    let average = if total == 0 {
        0.0
    } else {
        relevant.iter().map(|record| record.total_duration_ms as f64).sum::<f64>() / total as f64
    };

    WorkflowMetrics {
        workflow_id,
        total_executions: total,
        successful_executions: successful,
        failed_executions: total - successful,
        average_execution_time: average,
        last_executed: relevant.iter().map(|record| record.triggered_at).max(),
    }
}
