// Execution Recorder - append-only audit log of workflow executions

use async_trait::async_trait;
use cadence_shared::{ActionOutcome, EventType, ExecutionRecord, ExecutionStatus};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{WorkflowError, WorkflowResult};
use crate::pagination::{PaginatedResponse, PaginationParams};

/// History lookup for one workflow; `from` and `to` are inclusive.
#[derive(Debug, Clone)]
pub struct ExecutionQuery {
    pub workflow_id: Uuid,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub pagination: PaginationParams,
}

impl ExecutionQuery {
    pub fn for_workflow(workflow_id: Uuid) -> Self {
        Self {
            workflow_id,
            from: None,
            to: None,
            pagination: PaginationParams::default(),
        }
    }

    fn accepts(&self, record: &ExecutionRecord) -> bool {
        record.workflow_id == self.workflow_id
            && self.from.is_none_or(|from| record.triggered_at >= from)
            && self.to.is_none_or(|to| record.triggered_at <= to)
    }
}

/// Durable storage for execution records. There is deliberately no update or delete.
#[async_trait]
pub trait ExecutionRecordStore: Send + Sync {
    async fn append(&self, record: &ExecutionRecord) -> WorkflowResult<()>;
    /// One page of matching records, newest first, plus the total match count.
    async fn query(&self, query: &ExecutionQuery) -> WorkflowResult<(Vec<ExecutionRecord>, i64)>;
    /// Every record, optionally narrowed to one workflow, oldest first.
    async fn scan(&self, workflow_id: Option<Uuid>) -> WorkflowResult<Vec<ExecutionRecord>>;
}

pub struct ExecutionRecorder {
    store: Arc<dyn ExecutionRecordStore>,
    appended: AtomicU64,
}

impl ExecutionRecorder {
    pub fn new(store: Arc<dyn ExecutionRecordStore>) -> Self {
        Self {
            store,
            appended: AtomicU64::new(0),
        }
    }

    pub async fn record(&self, record: &ExecutionRecord) -> WorkflowResult<()> {
        self.store.append(record).await?;
        self.appended.fetch_add(1, Ordering::Release);
        debug!(
            "Recorded execution {} of workflow {} ({})",
            record.id, record.workflow_id, record.status
        );
        Ok(())
    }

    pub async fn history(&self, query: &ExecutionQuery) -> WorkflowResult<PaginatedResponse<ExecutionRecord>> {
        let (records, total) = self.store.query(query).await?;
        Ok(PaginatedResponse::new(records, &query.pagination, total))
    }

    /// Records appended through this recorder since startup.
    pub fn appended(&self) -> u64 {
        self.appended.load(Ordering::Acquire)
    }

    pub async fn records(&self, workflow_id: Option<Uuid>) -> WorkflowResult<Vec<ExecutionRecord>> {
        self.store.scan(workflow_id).await
    }
}

// ===== In-memory store =====

#[derive(Default)]
pub struct InMemoryExecutionStore {
    records: RwLock<Vec<ExecutionRecord>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionRecordStore for InMemoryExecutionStore {
    async fn append(&self, record: &ExecutionRecord) -> WorkflowResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn query(&self, query: &ExecutionQuery) -> WorkflowResult<(Vec<ExecutionRecord>, i64)> {
        let records = self.records.read().await;
        let mut matching: Vec<&ExecutionRecord> = records.iter().filter(|record| query.accepts(record)).collect();
        matching.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(query.pagination.offset() as usize)
            .take(query.pagination.limit() as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn scan(&self, workflow_id: Option<Uuid>) -> WorkflowResult<Vec<ExecutionRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|record| workflow_id.is_none_or(|id| record.workflow_id == id))
            .cloned()
            .collect())
    }
}

// ===== Postgres store =====

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: Uuid,
    trigger_id: Uuid,
    workflow_id: Uuid,
    workflow_name: String,
    event_type: String,
    triggered_at: DateTime<Utc>,
    status: String,
    action_results: Json<Vec<ActionOutcome>>,
    total_duration_ms: i64,
}

impl TryFrom<ExecutionRow> for ExecutionRecord {
    type Error = WorkflowError;

    fn try_from(row: ExecutionRow) -> Result<Self, Self::Error> {
        let event_type = row
            .event_type
            .parse::<EventType>()
            .map_err(|e| WorkflowError::Corrupt(format!("execution {}: {}", row.id, e)))?;
        let status = row
            .status
            .parse::<ExecutionStatus>()
            .map_err(|e| WorkflowError::Corrupt(format!("execution {}: {}", row.id, e)))?;

        Ok(ExecutionRecord {
            id: row.id,
            trigger_id: row.trigger_id,
            workflow_id: row.workflow_id,
            workflow_name: row.workflow_name,
            event_type,
            triggered_at: row.triggered_at,
            status,
            action_results: row.action_results.0,
            total_duration_ms: row.total_duration_ms,
        })
    }
}

const EXECUTION_COLUMNS: &str = "id, trigger_id, workflow_id, workflow_name, event_type, triggered_at, \
     status, action_results, total_duration_ms";

#[derive(Clone)]
pub struct PgExecutionStore {
    pool: PgPool,
}

impl PgExecutionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a ExecutionQuery) {
        builder.push(" WHERE workflow_id = ").push_bind(query.workflow_id);
        if let Some(from) = query.from {
            builder.push(" AND triggered_at >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            builder.push(" AND triggered_at <= ").push_bind(to);
        }
    }
}

fn convert_rows(rows: Vec<ExecutionRow>) -> Vec<ExecutionRecord> {
    rows.into_iter()
        .filter_map(|row| match ExecutionRecord::try_from(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping execution record: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl ExecutionRecordStore for PgExecutionStore {
    async fn append(&self, record: &ExecutionRecord) -> WorkflowResult<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_executions
            (id, trigger_id, workflow_id, workflow_name, event_type, triggered_at,
             status, action_results, total_duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(record.trigger_id)
        .bind(record.workflow_id)
        .bind(&record.workflow_name)
        .bind(record.event_type.as_str())
        .bind(record.triggered_at)
        .bind(record.status.as_str())
        .bind(Json(&record.action_results))
        .bind(record.total_duration_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query(&self, query: &ExecutionQuery) -> WorkflowResult<(Vec<ExecutionRecord>, i64)> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM workflow_executions");
        Self::push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM workflow_executions", EXECUTION_COLUMNS));
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY triggered_at DESC LIMIT ")
            .push_bind(query.pagination.limit())
            .push(" OFFSET ")
            .push_bind(query.pagination.offset());

        let rows = select
            .build_query_as::<ExecutionRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((convert_rows(rows), total))
    }

    async fn scan(&self, workflow_id: Option<Uuid>) -> WorkflowResult<Vec<ExecutionRecord>> {
        let mut select: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM workflow_executions", EXECUTION_COLUMNS));
        if let Some(workflow_id) = workflow_id {
            select.push(" WHERE workflow_id = ").push_bind(workflow_id);
        }
        select.push(" ORDER BY triggered_at ASC");

        let rows = select
            .build_query_as::<ExecutionRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(convert_rows(rows))
    }
}
