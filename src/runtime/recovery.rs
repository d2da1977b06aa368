use super::logging::{append_service_event, log_fields};
use super::StatePaths;
use crate::shared::fs_atomic::remove_dir_if_exists;
use crate::shared::{ErrorCode, ServiceError, TaskId};
use crate::task::TaskTracker;
use serde_json::json;

pub const INTERRUPTED_DETAIL: &str = "interrupted by service restart";

/// Fails every task a previous process left `RUNNING` and removes its
/// upload directory. Returns the ids that were recovered.
pub fn recover_interrupted_tasks(tracker: &TaskTracker) -> Result<Vec<TaskId>, ServiceError> {
    let paths: &StatePaths = tracker.paths();
    let mut recovered = Vec::new();
    for task_id in tracker.repository().running_task_ids()? {
        let error = ServiceError::with_detail(ErrorCode::UnexpectedError, INTERRUPTED_DETAIL);
        if !tracker.fail(&task_id, &error)? {
            continue;
        }
        let upload_dir = paths.task_upload_dir(&task_id);
        if let Err(err) = remove_dir_if_exists(&upload_dir) {
            append_service_event(
                paths,
                "warn",
                "recovery.cleanup_failed",
                &err.to_string(),
                log_fields([
                    ("taskId", json!(task_id.as_str())),
                    ("path", json!(upload_dir.display().to_string())),
                ]),
            );
        }
        append_service_event(
            paths,
            "warn",
            "recovery.interrupted",
            INTERRUPTED_DETAIL,
            log_fields([("taskId", json!(task_id.as_str()))]),
        );
        recovered.push(task_id);
    }
    Ok(recovered)
}
