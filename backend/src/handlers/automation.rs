use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use cadence_shared::{
    CreateWorkflowRequest, DryRunRequest, DryRunResponse, EventType, EventTypeInfo, ExecutionRecord,
    TriggerRequest, TriggerResponse, UpdateWorkflowRequest, WorkflowDefinition, WorkflowFilter,
    WorkflowMetrics, WorkflowStats, WorkflowTemplate,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiResult, AppError};
use crate::pagination::{HistoryParams, PaginatedResponse};
use crate::workflows::{presets, EventContext, ExecutionQuery};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowListQuery {
    pub is_active: Option<bool>,
    pub event_type: Option<String>,
}

pub fn automation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/workflows", get(list_workflows).post(create_workflow))
        .route(
            "/workflows/:id",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route("/workflows/:id/dry-run", post(dry_run_workflow))
        .route("/workflows/:id/metrics", get(workflow_metrics))
        .route("/workflows/:id/executions", get(workflow_executions))
        .route("/trigger", post(trigger_event))
        .route("/stats", get(workflow_stats))
        .route("/event-types", get(list_event_types))
        .route("/templates", get(list_templates))
        .route("/templates/:key", post(instantiate_template))
}

/// Decode a JSON body, reporting malformed input as a validation error.
fn decode<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::validation_single("body", format!("Invalid JSON body: {}", e)))
}

/// Like `decode`, but an empty body yields `T::default()`.
fn decode_or_default<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    decode(body)
}

fn parse_event_type(raw: &str) -> ApiResult<EventType> {
    raw.parse::<EventType>()
        .map_err(|e| AppError::validation_single("eventType", e.to_string()))
}

async fn list_workflows(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WorkflowListQuery>,
) -> ApiResult<Json<Vec<WorkflowDefinition>>> {
    let event_type = params.event_type.as_deref().map(parse_event_type).transpose()?;
    let filter = WorkflowFilter {
        is_active: params.is_active,
        event_type,
    };

    Ok(Json(state.store.list(&filter).await?))
}

async fn create_workflow(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<WorkflowDefinition>)> {
    let request: CreateWorkflowRequest = decode(&body)?;
    let workflow = state.store.create(request).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowDefinition>> {
    Ok(Json(state.store.get(id).await?))
}

async fn update_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<WorkflowDefinition>> {
    let patch: UpdateWorkflowRequest = decode(&body)?;
    Ok(Json(state.store.update(id, patch).await?))
}

async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn dry_run_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<DryRunResponse>> {
    let request: DryRunRequest = decode_or_default(&body)?;
    let preview = state.engine.dry_run(id, EventContext::new(request.context)).await?;
    Ok(Json(preview))
}

async fn workflow_metrics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowMetrics>> {
    state.store.get(id).await?;
    Ok(Json(state.metrics.workflow_metrics(id).await?))
}

async fn workflow_executions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<PaginatedResponse<ExecutionRecord>>> {
    state.store.get(id).await?;

    let query = ExecutionQuery {
        workflow_id: id,
        from: params.from,
        to: params.to,
        pagination: params.pagination(),
    };
    Ok(Json(state.recorder.history(&query).await?))
}

async fn trigger_event(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<TriggerResponse>> {
    let request: TriggerRequest = decode(&body)?;
    let event_type = parse_event_type(&request.event_type)?;

    let response = state
        .engine
        .trigger(event_type, EventContext::new(request.context))
        .await;

    Ok(Json(response))
}

async fn workflow_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<WorkflowStats>> {
    Ok(Json(state.metrics.stats().await?))
}

async fn list_event_types() -> Json<Vec<EventTypeInfo>> {
    Json(EventType::ALL.iter().copied().map(EventTypeInfo::from).collect())
}

async fn list_templates() -> Json<Vec<WorkflowTemplate>> {
    Json(presets::templates())
}

async fn instantiate_template(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<(StatusCode, Json<WorkflowDefinition>)> {
    let template = presets::find(&key).ok_or_else(|| AppError::NotFound(format!("Template '{}'", key)))?;
    let workflow = state.store.create(template.to_request()).await?;

    info!("Instantiated template '{}' as workflow {}", key, workflow.id);
    Ok((StatusCode::CREATED, Json(workflow)))
}
