use super::model::{Stage, Task, TaskStatus};
use crate::shared::time::from_millis;
use crate::shared::TaskId;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TaskRepositoryError {
    #[error("sqlite open failed at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create task database parent {path}: {source}")]
    CreateParent {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite statement failed: {source}")]
    Sql {
        #[source]
        source: rusqlite::Error,
    },
    #[error("invalid task {field} `{value}` in database")]
    InvalidColumn { field: &'static str, value: String },
}

fn sql(source: rusqlite::Error) -> TaskRepositoryError {
    TaskRepositoryError::Sql { source }
}

/// Progress columns written together while a task is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub stage: Stage,
    pub progress: u8,
    pub segment_progress: u8,
    pub embedding_progress: u8,
}

#[derive(Debug, Clone)]
pub struct TaskRepository {
    db_path: PathBuf,
}

const TASK_COLUMNS: &str = "
    task_id, file_name, model_type, status, progress, segment_progress,
    embedding_progress, stage, error_code, error_message, segment_count,
    artifact_sha256, vector_file_path, created_at, updated_at
";

impl TaskRepository {
    pub fn open(db_path: &Path) -> Result<Self, TaskRepositoryError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).map_err(|source| TaskRepositoryError::CreateParent {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    pub fn ensure_schema(&self) -> Result<(), TaskRepositoryError> {
        let connection = self.connect()?;
        connection
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS tasks (
                    task_id TEXT PRIMARY KEY,
                    file_name TEXT NOT NULL,
                    model_type TEXT NOT NULL,
                    status TEXT NOT NULL,
                    progress INTEGER NOT NULL,
                    segment_progress INTEGER NOT NULL,
                    embedding_progress INTEGER NOT NULL,
                    stage TEXT NOT NULL,
                    error_code TEXT,
                    error_message TEXT,
                    segment_count INTEGER,
                    artifact_sha256 TEXT,
                    vector_file_path TEXT,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
                CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
                ",
            )
            .map_err(sql)
    }

    pub fn insert(&self, task: &Task) -> Result<(), TaskRepositoryError> {
        let connection = self.connect()?;
        connection
            .execute(
                "
                INSERT INTO tasks (
                    task_id, file_name, model_type, status, progress, segment_progress,
                    embedding_progress, stage, error_code, error_message, segment_count,
                    artifact_sha256, vector_file_path, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                ",
                params![
                    task.id.as_str(),
                    task.file_name,
                    task.model_type,
                    task.status.as_str(),
                    task.progress,
                    task.segment_progress,
                    task.embedding_progress,
                    task.stage.as_str(),
                    task.error_code,
                    task.error_message,
                    task.segment_count.map(|v| v as i64),
                    task.artifact_sha256,
                    task.vector_file_path
                        .as_ref()
                        .map(|p| p.display().to_string()),
                    task.create_time.timestamp_millis(),
                    task.update_time.timestamp_millis(),
                ],
            )
            .map_err(sql)?;
        Ok(())
    }

    pub fn get(&self, task_id: &TaskId) -> Result<Option<Task>, TaskRepositoryError> {
        let connection = self.connect()?;
        let raw = connection
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?1"),
                params![task_id.as_str()],
                read_row,
            )
            .optional()
            .map_err(sql)?;
        raw.map(TaskRow::into_task).transpose()
    }

    /// All tasks, newest first.
    pub fn list(&self) -> Result<Vec<Task>, TaskRepositoryError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC, rowid DESC"
            ))
            .map_err(sql)?;
        let rows = statement.query_map([], read_row).map_err(sql)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(sql)?.into_task()?);
        }
        Ok(out)
    }

    pub fn running_task_ids(&self) -> Result<Vec<TaskId>, TaskRepositoryError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare("SELECT task_id FROM tasks WHERE status = 'RUNNING' ORDER BY created_at ASC")
            .map_err(sql)?;
        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(sql)?;

        let mut ids = Vec::new();
        for row in rows {
            let raw = row.map_err(sql)?;
            ids.push(parse_task_id(raw)?);
        }
        Ok(ids)
    }

    pub fn status(&self, task_id: &TaskId) -> Result<Option<TaskStatus>, TaskRepositoryError> {
        let connection = self.connect()?;
        let raw = connection
            .query_row(
                "SELECT status FROM tasks WHERE task_id = ?1",
                params![task_id.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(sql)?;
        raw.map(|value| parse_status(&value)).transpose()
    }

    // Every mutation below only touches RUNNING rows and reports whether
    // a row changed.

    pub fn update_progress(
        &self,
        task_id: &TaskId,
        update: ProgressUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool, TaskRepositoryError> {
        self.execute_guarded(
            "
            UPDATE tasks
            SET stage = ?2, progress = ?3, segment_progress = ?4,
                embedding_progress = ?5, updated_at = ?6
            WHERE task_id = ?1 AND status = 'RUNNING'
            ",
            params![
                task_id.as_str(),
                update.stage.as_str(),
                update.progress,
                update.segment_progress,
                update.embedding_progress,
                now.timestamp_millis(),
            ],
        )
    }

    pub fn complete(
        &self,
        task_id: &TaskId,
        vector_file_path: &Path,
        artifact_sha256: &str,
        segment_count: u64,
        now: DateTime<Utc>,
    ) -> Result<bool, TaskRepositoryError> {
        self.execute_guarded(
            "
            UPDATE tasks
            SET status = 'COMPLETED', stage = 'finished', progress = 100,
                segment_progress = 100, embedding_progress = 100,
                vector_file_path = ?2, artifact_sha256 = ?3, segment_count = ?4,
                updated_at = ?5
            WHERE task_id = ?1 AND status = 'RUNNING'
            ",
            params![
                task_id.as_str(),
                vector_file_path.display().to_string(),
                artifact_sha256,
                segment_count as i64,
                now.timestamp_millis(),
            ],
        )
    }

    pub fn fail(
        &self,
        task_id: &TaskId,
        error_code: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, TaskRepositoryError> {
        self.execute_guarded(
            "
            UPDATE tasks
            SET status = 'FAILED', error_code = ?2, error_message = ?3, updated_at = ?4
            WHERE task_id = ?1 AND status = 'RUNNING'
            ",
            params![
                task_id.as_str(),
                error_code,
                error_message,
                now.timestamp_millis()
            ],
        )
    }

    pub fn cancel(&self, task_id: &TaskId, now: DateTime<Utc>) -> Result<bool, TaskRepositoryError> {
        self.execute_guarded(
            "
            UPDATE tasks SET status = 'CANCELLED', updated_at = ?2
            WHERE task_id = ?1 AND status = 'RUNNING'
            ",
            params![task_id.as_str(), now.timestamp_millis()],
        )
    }

    fn execute_guarded(
        &self,
        statement: &str,
        params: impl rusqlite::Params,
    ) -> Result<bool, TaskRepositoryError> {
        let connection = self.connect()?;
        let changed = connection.execute(statement, params).map_err(sql)?;
        Ok(changed > 0)
    }

    fn connect(&self) -> Result<Connection, TaskRepositoryError> {
        let connection =
            Connection::open(&self.db_path).map_err(|source| TaskRepositoryError::Open {
                path: self.db_path.display().to_string(),
                source,
            })?;
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(sql)?;
        connection
            .execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(sql)?;
        Ok(connection)
    }
}

struct TaskRow {
    task_id: String,
    file_name: String,
    model_type: String,
    status: String,
    progress: u8,
    segment_progress: u8,
    embedding_progress: u8,
    stage: String,
    error_code: Option<String>,
    error_message: Option<String>,
    segment_count: Option<i64>,
    artifact_sha256: Option<String>,
    vector_file_path: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        task_id: row.get(0)?,
        file_name: row.get(1)?,
        model_type: row.get(2)?,
        status: row.get(3)?,
        progress: row.get(4)?,
        segment_progress: row.get(5)?,
        embedding_progress: row.get(6)?,
        stage: row.get(7)?,
        error_code: row.get(8)?,
        error_message: row.get(9)?,
        segment_count: row.get(10)?,
        artifact_sha256: row.get(11)?,
        vector_file_path: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

impl TaskRow {
    fn into_task(self) -> Result<Task, TaskRepositoryError> {
        let stage = Stage::parse(&self.stage).ok_or(TaskRepositoryError::InvalidColumn {
            field: "stage",
            value: self.stage.clone(),
        })?;
        Ok(Task {
            id: parse_task_id(self.task_id)?,
            file_name: self.file_name,
            model_type: self.model_type,
            status: parse_status(&self.status)?,
            progress: self.progress,
            segment_progress: self.segment_progress,
            embedding_progress: self.embedding_progress,
            stage,
            current_stage: stage.label().to_string(),
            error_code: self.error_code,
            error_message: self.error_message,
            segment_count: self.segment_count.map(|v| v.max(0) as u64),
            artifact_sha256: self.artifact_sha256,
            create_time: from_millis(self.created_at),
            update_time: from_millis(self.updated_at),
            vector_file_path: self.vector_file_path.map(PathBuf::from),
        })
    }
}

fn parse_task_id(raw: String) -> Result<TaskId, TaskRepositoryError> {
    TaskId::parse(&raw).map_err(|_| TaskRepositoryError::InvalidColumn {
        field: "task_id",
        value: raw,
    })
}

fn parse_status(raw: &str) -> Result<TaskStatus, TaskRepositoryError> {
    TaskStatus::parse(raw).ok_or_else(|| TaskRepositoryError::InvalidColumn {
        field: "status",
        value: raw.to_string(),
    })
}
