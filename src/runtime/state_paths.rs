use super::RuntimeError;
use crate::shared::TaskId;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![self.uploads_dir(), self.vectors_dir(), self.logs_dir()]
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn vectors_dir(&self) -> PathBuf {
        self.root.join("vectors")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn task_db_path(&self) -> PathBuf {
        self.root.join("tasks.db")
    }

    pub fn service_log_path(&self) -> PathBuf {
        self.logs_dir().join("service.log")
    }

    /// Per-task working directory holding the upload and its extraction.
    pub fn task_upload_dir(&self, task_id: &TaskId) -> PathBuf {
        self.uploads_dir().join(task_id.as_str())
    }

    pub fn task_extract_dir(&self, task_id: &TaskId) -> PathBuf {
        self.task_upload_dir(task_id).join("extracted")
    }

    pub fn task_vector_path(&self, task_id: &TaskId) -> PathBuf {
        self.vectors_dir().join(format!("{}.json", task_id.as_str()))
    }
}

pub fn default_state_root_path() -> Result<PathBuf, RuntimeError> {
    crate::config::default_state_root().map_err(|_| RuntimeError::HomeDirectoryUnavailable)
}

pub fn bootstrap_state_root(paths: &StatePaths) -> Result<(), RuntimeError> {
    for path in paths.required_directories() {
        fs::create_dir_all(&path).map_err(|source| RuntimeError::CreateDir {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}
