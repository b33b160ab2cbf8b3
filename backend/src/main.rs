use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod database;
mod error;
mod handlers;
mod jobs;
mod pagination;
mod services;
mod workflows;

use config::{Config, StorageBackend};
use workflows::{
    recorder::ExecutionRecordStore, store::WorkflowRepository, ActionDispatcher, Collaborators,
    DispatchLimits, ExecutionRecorder, MetricsAggregator, WorkflowEngine, WorkflowStore,
};

#[cfg(test)]
mod tests;

pub struct AppState {
    pub store: Arc<WorkflowStore>,
    pub engine: Arc<WorkflowEngine>,
    pub recorder: Arc<ExecutionRecorder>,
    pub metrics: Arc<MetricsAggregator>,
    /// Present when running on Postgres; used by the health check
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// Wire the engine components over the given persistence and collaborators.
    pub async fn assemble(
        repository: Arc<dyn WorkflowRepository>,
        records: Arc<dyn ExecutionRecordStore>,
        collaborators: Collaborators,
        config: &config::EngineConfig,
        db_pool: Option<PgPool>,
    ) -> workflows::WorkflowResult<Self> {
        let store = Arc::new(WorkflowStore::new(repository).await?);
        let recorder = Arc::new(ExecutionRecorder::new(records));
        let dispatcher = Arc::new(ActionDispatcher::new(
            collaborators,
            DispatchLimits {
                action_timeout: config.action_timeout,
                webhook_timeout: config.webhook_timeout,
            },
        ));
        let engine = Arc::new(WorkflowEngine::new(store.clone(), dispatcher, recorder.clone()));
        let metrics = Arc::new(MetricsAggregator::new(
            store.clone(),
            recorder.clone(),
            config.stats_cache_ttl,
        ));

        Ok(Self {
            store,
            engine,
            recorder,
            metrics,
            db_pool,
        })
    }
}

pub fn app(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(|| async { "Cadence Automation API v1" }))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1/automation", handlers::automation_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origins)),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed)
    }
}

fn email_sender(config: &Config) -> Arc<dyn workflows::EmailSender> {
    if !config.smtp.is_configured() {
        tracing::warn!("SMTP not configured; workflow emails will only be logged");
        return Arc::new(services::LogEmailSender);
    }

    match services::SmtpEmailSender::new(&config.smtp) {
        Ok(sender) => Arc::new(sender),
        Err(e) => {
            tracing::error!("Invalid SMTP configuration, falling back to log-only email: {}", e);
            Arc::new(services::LogEmailSender)
        }
    }
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let email = email_sender(config);
    let http = Arc::new(services::ReqwestHttpClient::new());

    let state = match config.storage {
        StorageBackend::Postgres => {
            let db_pool = database::create_pool(&config.database_url, &config.pool).await?;
            database::migrate(&db_pool).await?;

            AppState::assemble(
                Arc::new(workflows::PgWorkflowRepository::new(db_pool.clone())),
                Arc::new(workflows::PgExecutionStore::new(db_pool.clone())),
                Collaborators {
                    email,
                    notifications: Arc::new(services::PgNotificationStore::new(db_pool.clone())),
                    customers: Arc::new(services::PgCustomerRecordStore::new(db_pool.clone())),
                    http,
                },
                &config.engine,
                Some(db_pool),
            )
            .await?
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; workflows and history are lost on restart");

            AppState::assemble(
                Arc::new(workflows::InMemoryWorkflowRepository::new()),
                Arc::new(workflows::InMemoryExecutionStore::new()),
                Collaborators {
                    email,
                    notifications: Arc::new(services::InMemoryNotificationStore::new()),
                    customers: Arc::new(services::InMemoryCustomerRecordStore::new()),
                    http,
                },
                &config.engine,
                None,
            )
            .await?
        }
    };

    Ok(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let app_state = Arc::new(build_state(&config).await?);

    let mut scheduler = match &config.maintenance_cron {
        Some(schedule) => {
            let scheduler = jobs::MaintenanceScheduler::new(app_state.engine.clone(), schedule).await?;
            scheduler.start().await?;
            Some(scheduler)
        }
        None => None,
    };

    let app = app(app_state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!("Server running on {}", config.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.shutdown().await?;
    }

    Ok(())
}
