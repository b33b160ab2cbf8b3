use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

pub mod automation;

pub use automation::automation_routes;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    match &state.db_pool {
        Some(pool) if !crate::database::health_check(pool).await => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unhealthy", "service": "cadence-automation", "storage": "postgres"})),
        ),
        Some(_) => (
            StatusCode::OK,
            Json(json!({"status": "healthy", "service": "cadence-automation", "storage": "postgres"})),
        ),
        None => (
            StatusCode::OK,
            Json(json!({"status": "healthy", "service": "cadence-automation", "storage": "memory"})),
        ),
    }
}
