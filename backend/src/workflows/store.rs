// Workflow Store - validated CRUD over workflow definitions plus the active-rule cache

use async_trait::async_trait;
use cadence_shared::{
    Action, Condition, CreateWorkflowRequest, EventType, RetryPolicy, UpdateWorkflowRequest,
    WorkflowDefinition, WorkflowFilter,
};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::{ValidationErrors, WorkflowError, WorkflowResult};

/// Persistence for workflow definitions. Each call is a single-record write or a read.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn insert(&self, workflow: &WorkflowDefinition) -> WorkflowResult<()>;
    async fn get(&self, id: Uuid) -> WorkflowResult<Option<WorkflowDefinition>>;
    /// Newest first.
    async fn list(&self, filter: &WorkflowFilter) -> WorkflowResult<Vec<WorkflowDefinition>>;
    /// Returns false when no row has this id.
    async fn replace(&self, workflow: &WorkflowDefinition) -> WorkflowResult<bool>;
    /// Returns false when no row has this id.
    async fn delete(&self, id: Uuid) -> WorkflowResult<bool>;
}

pub struct WorkflowStore {
    repository: Arc<dyn WorkflowRepository>,
    active: RwLock<Vec<WorkflowDefinition>>,
    writer: Mutex<()>,
    revision: AtomicU64,
}

impl WorkflowStore {
    /// Create the store and load the active-rule cache from the repository.
    pub async fn new(repository: Arc<dyn WorkflowRepository>) -> WorkflowResult<Self> {
        let store = Self {
            repository,
            active: RwLock::new(Vec::new()),
            writer: Mutex::new(()),
            revision: AtomicU64::new(0),
        };
        store.reload().await?;
        Ok(store)
    }

    /// Rebuild the active-rule cache from the repository.
    pub async fn reload(&self) -> WorkflowResult<usize> {
        let _guard = self.writer.lock().await;

        let filter = WorkflowFilter {
            is_active: Some(true),
            event_type: None,
        };
        let mut definitions = self.repository.list(&filter).await?;
        definitions.sort_by_key(|workflow| workflow.created_at);

        let count = definitions.len();
        *self.active.write().await = definitions;
        self.revision.fetch_add(1, Ordering::Release);

        info!("Loaded {} active workflows", count);
        Ok(count)
    }

    pub async fn create(&self, request: CreateWorkflowRequest) -> WorkflowResult<WorkflowDefinition> {
        let event_type = validate(&request.name, &request.event_type, &request.actions)?;
        warn_unsupported_actions(&request.name, &request.actions);

        let now = Utc::now();
        let workflow = WorkflowDefinition {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            description: normalize_description(request.description),
            event_type,
            is_active: request.is_active,
            conditions: request.conditions,
            actions: request.actions,
            created_at: now,
            updated_at: now,
        };

        let _guard = self.writer.lock().await;
        self.repository.insert(&workflow).await?;
        self.cache(&workflow).await;

        info!("Created workflow '{}' ({}) for {}", workflow.name, workflow.id, workflow.event_type);
        Ok(workflow)
    }

    pub async fn get(&self, id: Uuid) -> WorkflowResult<WorkflowDefinition> {
        self.repository.get(id).await?.ok_or(WorkflowError::NotFound(id))
    }

    pub async fn list(&self, filter: &WorkflowFilter) -> WorkflowResult<Vec<WorkflowDefinition>> {
        self.repository.list(filter).await
    }

    /// Field-level merge of `patch` into the stored definition.
    pub async fn update(&self, id: Uuid, patch: UpdateWorkflowRequest) -> WorkflowResult<WorkflowDefinition> {
        let _guard = self.writer.lock().await;

        let mut workflow = self.repository.get(id).await?.ok_or(WorkflowError::NotFound(id))?;

        let name = patch.name.unwrap_or_else(|| workflow.name.clone());
        let event_type = patch
            .event_type
            .unwrap_or_else(|| workflow.event_type.as_str().to_string());
        let actions = patch.actions.unwrap_or_else(|| workflow.actions.clone());

        workflow.event_type = validate(&name, &event_type, &actions)?;
        warn_unsupported_actions(&name, &actions);

        workflow.name = name.trim().to_string();
        workflow.actions = actions;
        if let Some(description) = patch.description {
            workflow.description = normalize_description(Some(description));
        }
        if let Some(is_active) = patch.is_active {
            workflow.is_active = is_active;
        }
        if let Some(conditions) = patch.conditions {
            workflow.conditions = conditions;
        }
        workflow.updated_at = Utc::now();

        if !self.repository.replace(&workflow).await? {
            return Err(WorkflowError::NotFound(id));
        }
        self.cache(&workflow).await;

        info!("Updated workflow '{}' ({})", workflow.name, workflow.id);
        Ok(workflow)
    }

    pub async fn delete(&self, id: Uuid) -> WorkflowResult<()> {
        let _guard = self.writer.lock().await;

        if !self.repository.delete(id).await? {
            return Err(WorkflowError::NotFound(id));
        }
        self.active.write().await.retain(|workflow| workflow.id != id);
        self.revision.fetch_add(1, Ordering::Release);

        info!("Deleted workflow {}", id);
        Ok(())
    }

    /// Point-in-time copy of the active definitions for `event_type`, oldest first.
    /// Later edits never reach a snapshot that was already taken.
    pub async fn find_active_by_event_type(&self, event_type: EventType) -> Vec<WorkflowDefinition> {
        self.active
            .read()
            .await
            .iter()
            .filter(|workflow| workflow.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Bumped on every successful write; lets readers detect stale summaries.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Keep the active cache in step with a definition that was just written.
    /// Callers hold the writer lock.
    async fn cache(&self, workflow: &WorkflowDefinition) {
        self.revision.fetch_add(1, Ordering::Release);
        let mut active = self.active.write().await;
        active.retain(|existing| existing.id != workflow.id);
        if workflow.is_active {
            active.push(workflow.clone());
            active.sort_by_key(|existing| existing.created_at);
        }
    }
}

fn validate(name: &str, event_type: &str, actions: &[Action]) -> WorkflowResult<EventType> {
    let mut errors = ValidationErrors::new();

    if name.trim().is_empty() {
        errors.add("name", "Name is required");
    }
    if actions.is_empty() {
        errors.add("actions", "At least one action is required");
    }
    for (index, action) in actions.iter().enumerate() {
        if action.retry.is_some_and(|retry| !retry.is_within_bounds()) {
            errors.add(
                "retry",
                format!(
                    "Action {}: maxAttempts must be 1 to {} and delayMs at most {}",
                    index + 1,
                    RetryPolicy::MAX_ATTEMPTS,
                    RetryPolicy::MAX_DELAY_MS
                ),
            );
        }
    }

    let parsed = match event_type.trim() {
        "" => Err("Event type is required".to_string()),
        raw => raw.parse::<EventType>().map_err(|e| e.to_string()),
    };

    match parsed {
        Ok(event_type) => errors.into_result().map(|()| event_type),
        Err(message) => {
            errors.add("eventType", message);
            Err(errors.into_error())
        }
    }
}

fn warn_unsupported_actions(name: &str, actions: &[Action]) {
    for action in actions.iter().filter(|action| !action.action_type.is_supported()) {
        warn!(
            "Workflow '{}' uses unsupported action type '{}'; it will fail at execution",
            name, action.action_type
        );
    }
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

// ===== In-memory repository =====

#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    workflows: RwLock<HashMap<Uuid, WorkflowDefinition>>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn insert(&self, workflow: &WorkflowDefinition) -> WorkflowResult<()> {
        self.workflows.write().await.insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> WorkflowResult<Option<WorkflowDefinition>> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }

    async fn list(&self, filter: &WorkflowFilter) -> WorkflowResult<Vec<WorkflowDefinition>> {
        let mut workflows: Vec<WorkflowDefinition> = self
            .workflows
            .read()
            .await
            .values()
            .filter(|workflow| filter.accepts(workflow))
            .cloned()
            .collect();
        workflows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(workflows)
    }

    async fn replace(&self, workflow: &WorkflowDefinition) -> WorkflowResult<bool> {
        let mut workflows = self.workflows.write().await;
        match workflows.get_mut(&workflow.id) {
            Some(existing) => {
                *existing = workflow.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> WorkflowResult<bool> {
        Ok(self.workflows.write().await.remove(&id).is_some())
    }
}

// ===== Postgres repository =====

#[derive(sqlx::FromRow)]
struct WorkflowRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    event_type: String,
    is_active: bool,
    conditions: Json<Vec<Condition>>,
    actions: Json<Vec<Action>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WorkflowRow> for WorkflowDefinition {
    type Error = WorkflowError;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        let event_type = row
            .event_type
            .parse::<EventType>()
            .map_err(|e| WorkflowError::Corrupt(format!("workflow {}: {}", row.id, e)))?;

        Ok(WorkflowDefinition {
            id: row.id,
            name: row.name,
            description: row.description,
            event_type,
            is_active: row.is_active,
            conditions: row.conditions.0,
            actions: row.actions.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const WORKFLOW_COLUMNS: &str =
    "id, name, description, event_type, is_active, conditions, actions, created_at, updated_at";

#[derive(Clone)]
pub struct PgWorkflowRepository {
    pool: PgPool,
}

impl PgWorkflowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowRepository for PgWorkflowRepository {
    async fn insert(&self, workflow: &WorkflowDefinition) -> WorkflowResult<()> {
        sqlx::query(
            r#"
            INSERT INTO workflows
            (id, name, description, event_type, is_active, conditions, actions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(workflow.id)
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(workflow.event_type.as_str())
        .bind(workflow.is_active)
        .bind(Json(&workflow.conditions))
        .bind(Json(&workflow.actions))
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> WorkflowResult<Option<WorkflowDefinition>> {
        let row = sqlx::query_as::<_, WorkflowRow>(&format!(
            "SELECT {} FROM workflows WHERE id = $1",
            WORKFLOW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WorkflowDefinition::try_from).transpose()
    }

    async fn list(&self, filter: &WorkflowFilter) -> WorkflowResult<Vec<WorkflowDefinition>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM workflows WHERE TRUE", WORKFLOW_COLUMNS));

        if let Some(is_active) = filter.is_active {
            query.push(" AND is_active = ").push_bind(is_active);
        }
        if let Some(event_type) = filter.event_type {
            query.push(" AND event_type = ").push_bind(event_type.as_str());
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query
            .build_query_as::<WorkflowRow>()
            .fetch_all(&self.pool)
            .await?;

        // One bad row must not take every rule offline.
        Ok(rows
            .into_iter()
            .filter_map(|row| match WorkflowDefinition::try_from(row) {
                Ok(workflow) => Some(workflow),
                Err(e) => {
                    warn!("Skipping workflow: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn replace(&self, workflow: &WorkflowDefinition) -> WorkflowResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workflows
            SET name = $2, description = $3, event_type = $4, is_active = $5,
                conditions = $6, actions = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(workflow.id)
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(workflow.event_type.as_str())
        .bind(workflow.is_active)
        .bind(Json(&workflow.conditions))
        .bind(Json(&workflow.actions))
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> WorkflowResult<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
