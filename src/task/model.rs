use crate::shared::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "RUNNING" => Some(Self::Running),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preparing,
    Segmenting,
    Embedding,
    Finished,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Preparing,
        Stage::Segmenting,
        Stage::Embedding,
        Stage::Finished,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Segmenting => "segmenting",
            Self::Embedding => "embedding",
            Self::Finished => "finished",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == raw)
    }

    /// Display label carried as `currentStage`.
    pub fn label(self) -> &'static str {
        match self {
            Self::Preparing => "preparing files",
            Self::Segmenting => "segmenting documents",
            Self::Embedding => "generating embeddings",
            Self::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub file_name: String,
    pub model_type: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub segment_progress: u8,
    pub embedding_progress: u8,
    pub stage: Stage,
    pub current_stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_sha256: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    #[serde(skip)]
    pub vector_file_path: Option<PathBuf>,
}

impl Task {
    pub fn new_running(id: TaskId, file_name: &str, model_type: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            file_name: file_name.to_string(),
            model_type: model_type.to_string(),
            status: TaskStatus::Running,
            progress: 0,
            segment_progress: 0,
            embedding_progress: 0,
            stage: Stage::Preparing,
            current_stage: Stage::Preparing.label().to_string(),
            error_code: None,
            error_message: None,
            segment_count: None,
            artifact_sha256: None,
            create_time: now,
            update_time: now,
            vector_file_path: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Weighted overall progress: segmentation counts 30%, embedding 70%.
pub fn overall_progress(stage: Stage, segment_progress: u8, embedding_progress: u8) -> u8 {
    let segment = u32::from(segment_progress.min(100));
    let embedding = u32::from(embedding_progress.min(100));
    let overall = match stage {
        Stage::Preparing => 0,
        Stage::Segmenting => segment * 30 / 100,
        Stage::Embedding => 30 + embedding * 70 / 100,
        Stage::Finished => 100,
    };
    overall.min(100) as u8
}

/// Percentage of `done` out of `total`, where an empty total counts as done.
pub fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}
