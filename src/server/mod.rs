//! HTTP API for document vectorization.

pub mod embedding_routes;
pub mod response;
pub mod task_routes;
pub mod upload;

use crate::config::Settings;
use crate::embedding::{DefaultEmbedderFactory, EmbedderFactory};
use crate::ingest::HeuristicTokenizer;
use crate::pipeline::PipelineContext;
use crate::runtime::{bootstrap_state_root, JobRunner, StatePaths};
use crate::shared::{ErrorCode, ServiceError, TaskId};
use crate::task::TaskTracker;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub use response::{status_for, ApiResponse, ApiResult};

/// Multipart framing on top of the archive itself.
const BODY_LIMIT_SLACK_BYTES: usize = 1024 * 1024;

/// Shared state behind every handler.
pub struct AppState {
    pub settings: Settings,
    pub pipeline: PipelineContext,
    pub runner: JobRunner,
}

impl AppState {
    pub fn new(settings: Settings, paths: &StatePaths) -> Result<Self, ServiceError> {
        Self::with_embedders(settings, paths, Arc::new(DefaultEmbedderFactory))
    }

    pub fn with_embedders(
        settings: Settings,
        paths: &StatePaths,
        embedders: Arc<dyn EmbedderFactory>,
    ) -> Result<Self, ServiceError> {
        bootstrap_state_root(paths).map_err(|err| {
            ServiceError::with_detail(ErrorCode::DirectoryCreateFailed, err.to_string())
        })?;
        let tracker = TaskTracker::open(paths)?;
        let runner = JobRunner::new(settings.server.max_concurrent_jobs);
        Ok(Self {
            settings,
            pipeline: PipelineContext {
                tracker,
                embedders,
                tokens: Arc::new(HeuristicTokenizer),
            },
            runner,
        })
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.pipeline.tracker
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.settings.server.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_SLACK_BYTES);
    let static_dir = state
        .settings
        .server
        .static_dir
        .clone()
        .filter(|dir| dir.is_dir());

    let api = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/embedding/test", post(embedding_routes::test_config))
        .route("/api/embedding/process", post(embedding_routes::process))
        .route(
            "/api/embedding/download/:task_id",
            get(embedding_routes::download),
        )
        .route("/api/tasks", get(task_routes::list_tasks))
        .route("/api/tasks/:task_id", get(task_routes::get_task))
        .route("/api/tasks/:task_id/cancel", post(task_routes::cancel_task))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    let router = match static_dir {
        // Browser routes such as `/tasks` resolve to the bundled index page.
        Some(dir) => {
            let index = dir.join("index.html");
            api.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        None => api,
    };

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serves until `shutdown` resolves, then lets in-flight requests finish.
pub async fn serve<F>(
    state: Arc<AppState>,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

pub(crate) fn parse_task_id(raw: &str) -> Result<TaskId, ServiceError> {
    TaskId::parse(raw.trim())
        .map_err(|err| ServiceError::with_detail(ErrorCode::TaskNotFound, err))
}

/// Runs synchronous storage or pipeline work off the async executor.
pub(crate) async fn blocking<F, T>(work: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| ServiceError::with_detail(ErrorCode::SystemError, err.to_string()))?
}
