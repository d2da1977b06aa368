use super::response::{ok, ApiResult};
use super::{blocking, parse_task_id, AppState};
use crate::task::Task;
use axum::extract::{Path, State};
use std::sync::Arc;

pub async fn list_tasks(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Task>> {
    let tracker = state.pipeline.tracker.clone();
    ok(blocking(move || tracker.list()).await?)
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> ApiResult<Task> {
    let task_id = parse_task_id(&raw_id)?;
    let tracker = state.pipeline.tracker.clone();
    ok(blocking(move || tracker.get(&task_id)).await?)
}

/// Cancels a running task. No response data on success.
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> ApiResult<()> {
    let task_id = parse_task_id(&raw_id)?;
    let tracker = state.pipeline.tracker.clone();
    blocking(move || tracker.cancel(&task_id)?.into_result()).await?;
    ok(())
}
