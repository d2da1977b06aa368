use super::model::{overall_progress, Stage, Task, TaskStatus};
use super::repository::{ProgressUpdate, TaskRepository, TaskRepositoryError};
use crate::runtime::logging::{append_service_event, log_fields};
use crate::runtime::StatePaths;
use crate::shared::time::now_utc;
use crate::shared::{ErrorCode, ServiceError, TaskId};
use serde_json::json;
use std::path::Path;

impl From<TaskRepositoryError> for ServiceError {
    fn from(err: TaskRepositoryError) -> Self {
        ServiceError::with_detail(ErrorCode::SystemError, err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
    AlreadyCompleted,
    AlreadyFailed,
    AlreadyCancelled,
}

impl CancelOutcome {
    pub fn into_result(self) -> Result<(), ServiceError> {
        match self {
            Self::Cancelled => Ok(()),
            Self::NotFound => Err(ServiceError::new(ErrorCode::TaskNotFound)),
            Self::AlreadyCompleted => Err(ServiceError::new(ErrorCode::TaskAlreadyCompleted)),
            Self::AlreadyFailed => Err(ServiceError::with_detail(
                ErrorCode::TaskAlreadyCompleted,
                "task status is FAILED",
            )),
            Self::AlreadyCancelled => Err(ServiceError::new(ErrorCode::TaskAlreadyCancelled)),
        }
    }
}

/// Task lifecycle service. Owns every status transition and records each one
/// in the service log.
#[derive(Debug, Clone)]
pub struct TaskTracker {
    repository: TaskRepository,
    paths: StatePaths,
}

impl TaskTracker {
    pub fn new(repository: TaskRepository, paths: StatePaths) -> Self {
        Self { repository, paths }
    }

    pub fn open(paths: &StatePaths) -> Result<Self, ServiceError> {
        let repository = TaskRepository::open(&paths.task_db_path())?;
        Ok(Self::new(repository, paths.clone()))
    }

    pub fn paths(&self) -> &StatePaths {
        &self.paths
    }

    pub fn repository(&self) -> &TaskRepository {
        &self.repository
    }

    pub fn create(&self, file_name: &str, model_type: &str) -> Result<Task, ServiceError> {
        let id = TaskId::generate()
            .map_err(|err| ServiceError::with_detail(ErrorCode::SystemError, err.to_string()))?;
        let task = Task::new_running(id, file_name, model_type, now_utc());
        self.repository.insert(&task)?;
        append_service_event(
            &self.paths,
            "info",
            "task.created",
            "task created",
            log_fields([
                ("taskId", json!(task.id.as_str())),
                ("fileName", json!(file_name)),
                ("modelType", json!(model_type)),
            ]),
        );
        Ok(task)
    }

    pub fn get(&self, task_id: &TaskId) -> Result<Task, ServiceError> {
        self.repository
            .get(task_id)?
            .ok_or_else(|| ServiceError::new(ErrorCode::TaskNotFound))
    }

    pub fn list(&self) -> Result<Vec<Task>, ServiceError> {
        Ok(self.repository.list()?)
    }

    pub fn set_stage(&self, task_id: &TaskId, stage: Stage) -> Result<bool, ServiceError> {
        let current = self.get(task_id)?;
        let (segment, embedding) = match stage {
            Stage::Preparing | Stage::Segmenting => (current.segment_progress, 0),
            Stage::Embedding => (100, current.embedding_progress),
            Stage::Finished => (100, 100),
        };
        let changed = self.write_progress(task_id, stage, segment, embedding)?;
        if changed {
            append_service_event(
                &self.paths,
                "info",
                "task.stage",
                stage.label(),
                log_fields([
                    ("taskId", json!(task_id.as_str())),
                    ("stage", json!(stage.as_str())),
                ]),
            );
        }
        Ok(changed)
    }

    pub fn record_segment_progress(
        &self,
        task_id: &TaskId,
        percent: u8,
    ) -> Result<bool, ServiceError> {
        self.write_progress(task_id, Stage::Segmenting, percent, 0)
    }

    pub fn record_embedding_progress(
        &self,
        task_id: &TaskId,
        percent: u8,
    ) -> Result<bool, ServiceError> {
        self.write_progress(task_id, Stage::Embedding, 100, percent)
    }

    fn write_progress(
        &self,
        task_id: &TaskId,
        stage: Stage,
        segment_progress: u8,
        embedding_progress: u8,
    ) -> Result<bool, ServiceError> {
        let segment_progress = segment_progress.min(100);
        let embedding_progress = embedding_progress.min(100);
        let update = ProgressUpdate {
            stage,
            progress: overall_progress(stage, segment_progress, embedding_progress),
            segment_progress,
            embedding_progress,
        };
        Ok(self.repository.update_progress(task_id, update, now_utc())?)
    }

    pub fn complete(
        &self,
        task_id: &TaskId,
        vector_file_path: &Path,
        artifact_sha256: &str,
        segment_count: u64,
    ) -> Result<bool, ServiceError> {
        let changed = self.repository.complete(
            task_id,
            vector_file_path,
            artifact_sha256,
            segment_count,
            now_utc(),
        )?;
        if changed {
            append_service_event(
                &self.paths,
                "info",
                "task.completed",
                "task completed",
                log_fields([
                    ("taskId", json!(task_id.as_str())),
                    ("segmentCount", json!(segment_count)),
                    ("sha256", json!(artifact_sha256)),
                ]),
            );
        }
        Ok(changed)
    }

    pub fn fail(&self, task_id: &TaskId, error: &ServiceError) -> Result<bool, ServiceError> {
        let message = error.render();
        let changed = self
            .repository
            .fail(task_id, error.code.code(), &message, now_utc())?;
        if changed {
            append_service_event(
                &self.paths,
                "error",
                "task.failed",
                &message,
                log_fields([
                    ("taskId", json!(task_id.as_str())),
                    ("errorCode", json!(error.code.code())),
                ]),
            );
        }
        Ok(changed)
    }

    pub fn cancel(&self, task_id: &TaskId) -> Result<CancelOutcome, ServiceError> {
        if self.repository.cancel(task_id, now_utc())? {
            append_service_event(
                &self.paths,
                "info",
                "task.cancelled",
                "task cancelled",
                log_fields([("taskId", json!(task_id.as_str()))]),
            );
            return Ok(CancelOutcome::Cancelled);
        }
        Ok(match self.repository.status(task_id)? {
            None => CancelOutcome::NotFound,
            Some(TaskStatus::Completed) => CancelOutcome::AlreadyCompleted,
            Some(TaskStatus::Failed) => CancelOutcome::AlreadyFailed,
            Some(TaskStatus::Cancelled) => CancelOutcome::AlreadyCancelled,
            Some(TaskStatus::Running) => {
                return Err(ServiceError::with_detail(
                    ErrorCode::SystemError,
                    "task changed while cancelling, retry",
                ))
            }
        })
    }

    /// True once the task has been cancelled or no longer exists.
    pub fn is_cancelled(&self, task_id: &TaskId) -> Result<bool, ServiceError> {
        Ok(matches!(
            self.repository.status(task_id)?,
            None | Some(TaskStatus::Cancelled)
        ))
    }
}
