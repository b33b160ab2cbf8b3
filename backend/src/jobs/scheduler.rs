// Maintenance Scheduler - fires SCHEDULED_MAINTENANCE on a cron schedule

use cadence_shared::EventType;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{info, warn};

use crate::workflows::{EventContext, WorkflowEngine};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(#[from] JobSchedulerError),
}

pub type JobResult<T> = Result<T, JobError>;

pub struct MaintenanceScheduler {
    scheduler: JobScheduler,
    schedule: String,
}

impl MaintenanceScheduler {
    pub async fn new(engine: Arc<WorkflowEngine>, schedule: &str) -> JobResult<Self> {
        let scheduler = JobScheduler::new().await?;
        scheduler.add(maintenance_job(engine, schedule)?).await?;

        Ok(Self {
            scheduler,
            schedule: schedule.to_string(),
        })
    }

    pub async fn start(&self) -> JobResult<()> {
        self.scheduler.start().await?;
        info!("Maintenance scheduler started ({})", self.schedule);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> JobResult<()> {
        info!("Shutting down maintenance scheduler");
        self.scheduler.shutdown().await?;
        Ok(())
    }
}

/// Context handed to maintenance workflows: `{maintenance: {runAt, schedule}}`.
pub fn maintenance_context(schedule: &str, run_at: DateTime<Utc>) -> EventContext {
    EventContext::default().with(
        "maintenance",
        json!({
            "runAt": run_at.to_rfc3339(),
            "schedule": schedule,
        }),
    )
}

fn maintenance_job(engine: Arc<WorkflowEngine>, schedule: &str) -> JobResult<Job> {
    let cron_expr = schedule.to_string();

    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let engine = engine.clone();
        let cron_expr = cron_expr.clone();

        Box::pin(async move {
            info!("Running scheduled maintenance trigger");

            let context = maintenance_context(&cron_expr, Utc::now());
            let response = engine.trigger(EventType::ScheduledMaintenance, context).await;

            if response.errors.is_empty() {
                info!(
                    "Scheduled maintenance ran {} workflow(s), {} action(s)",
                    response.triggered_workflow_ids.len(),
                    response.executed_actions_count
                );
            } else {
                warn!(
                    "Scheduled maintenance finished with errors: {}",
                    response.errors.join("; ")
                );
            }
        })
    })?;

    Ok(job)
}
