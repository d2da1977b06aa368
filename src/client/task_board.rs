use super::api::{ApiClient, DownloadedArtifact};
use super::error::ClientError;
use super::poller::{poll_until, PollHandle, PollPolicy, PollStep};
use crate::runtime::RuntimeError;
use crate::shared::time::now_utc;
use crate::task::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::convert::Infallible;
use std::path::Path;
use std::sync::mpsc::{self, Receiver};

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub task: Task,
    /// A cancel request succeeded; actions stay off until the task is no
    /// longer reported running.
    pub pending_cancel: bool,
}

impl TaskRow {
    pub fn can_cancel(&self) -> bool {
        !self.pending_cancel && self.task.status == TaskStatus::Running
    }

    pub fn can_download(&self) -> bool {
        !self.pending_cancel && self.task.status == TaskStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelResult {
    Requested,
    NotCancellable,
    UnknownRow,
}

/// Task manager state: the last fetched list plus per-row action flags.
#[derive(Debug)]
pub struct TaskBoard {
    client: ApiClient,
    rows: Vec<TaskRow>,
    last_error: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl TaskBoard {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            rows: Vec::new(),
            last_error: None,
            refreshed_at: None,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn rows(&self) -> &[TaskRow] {
        &self.rows
    }

    pub fn row(&self, task_id: &str) -> Option<&TaskRow> {
        self.rows.iter().find(|row| row.task.id.as_str() == task_id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Replaces the rows with a fresh list. On failure the previous rows stay
    /// on screen and the error is remembered.
    pub fn refresh(&mut self) -> Result<usize, ClientError> {
        match self.client.list_tasks() {
            Ok(tasks) => {
                self.apply(tasks);
                Ok(self.rows.len())
            }
            Err(err) => {
                self.last_error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Replaces the rows with `tasks`. A row whose cancel was accepted keeps
    /// `pending_cancel` while the list still reports it running, so a fetch
    /// that started before the cancel cannot re-enable its actions.
    pub fn apply(&mut self, tasks: Vec<Task>) {
        let pending: HashSet<String> = self
            .rows
            .iter()
            .filter(|row| row.pending_cancel)
            .map(|row| row.task.id.to_string())
            .collect();
        self.rows = tasks
            .into_iter()
            .map(|task| TaskRow {
                pending_cancel: task.status == TaskStatus::Running
                    && pending.contains(task.id.as_str()),
                task,
            })
            .collect();
        self.last_error = None;
        self.refreshed_at = Some(now_utc());
    }

    pub fn record_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    /// One cancel request per call, followed by an immediate refresh.
    pub fn cancel(&mut self, task_id: &str) -> Result<CancelResult, ClientError> {
        let Some(index) = self
            .rows
            .iter()
            .position(|row| row.task.id.as_str() == task_id)
        else {
            return Ok(CancelResult::UnknownRow);
        };
        if !self.rows[index].can_cancel() {
            return Ok(CancelResult::NotCancellable);
        }
        self.client.cancel_task(task_id)?;
        self.rows[index].pending_cancel = true;
        let _ = self.refresh();
        Ok(CancelResult::Requested)
    }

    pub fn download(
        &self,
        task_id: &str,
        dir: &Path,
    ) -> Result<Option<DownloadedArtifact>, ClientError> {
        match self.row(task_id) {
            Some(row) if row.can_download() => self.client.download(task_id, dir).map(Some),
            _ => Ok(None),
        }
    }

    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return match &self.last_error {
                Some(err) => format!("no tasks ({err})"),
                None => "no tasks".to_string(),
            };
        }
        let mut lines = vec![format!(
            "{:<36}  {:<9}  {:>4}  {:<22}  {:<24}  {:<8}  {}",
            "ID", "STATUS", "PCT", "STAGE", "FILE", "ACTIONS", "CREATED"
        )];
        for row in &self.rows {
            let mut actions = Vec::new();
            if row.can_cancel() {
                actions.push("cancel");
            }
            if row.can_download() {
                actions.push("download");
            }
            lines.push(format!(
                "{:<36}  {:<9}  {:>3}%  {:<22}  {:<24}  {:<8}  {}",
                row.task.id.as_str(),
                row.task.status.as_str(),
                row.task.progress,
                row.task.current_stage,
                truncate(&row.task.file_name, 24),
                actions.join(","),
                row.task.create_time.format("%Y-%m-%d %H:%M:%S"),
            ));
            if let Some(message) = row.task.error_message.as_deref() {
                lines.push(format!("    error: {message}"));
            }
        }
        if let Some(err) = &self.last_error {
            lines.push(format!("last refresh failed: {err}"));
        }
        lines.join("\n")
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out = value.chars().take(width.saturating_sub(1)).collect::<String>();
    out.push('~');
    out
}

/// Background refresh of the task list on a fixed cadence. Each fetch result
/// is delivered on the receiver; dropping the watcher stops the thread.
#[derive(Debug)]
pub struct TaskListWatcher {
    _handle: PollHandle,
    updates: Receiver<Result<Vec<Task>, String>>,
}

impl TaskListWatcher {
    pub fn start(client: ApiClient, policy: PollPolicy) -> Result<Self, RuntimeError> {
        let (sender, updates) = mpsc::channel();
        let handle = PollHandle::spawn("task-list-watch", move |stop| {
            let _ = poll_until::<(), Infallible, _>(&policy, stop, || {
                let fetched = client.list_tasks().map_err(|err| err.user_message());
                if sender.send(fetched).is_err() {
                    return Ok(PollStep::Done(()));
                }
                Ok(PollStep::Continue)
            });
        })?;
        Ok(Self {
            _handle: handle,
            updates,
        })
    }

    /// Newest pending update, if any arrived since the last call.
    pub fn latest(&self) -> Option<Result<Vec<Task>, String>> {
        self.updates.try_iter().last()
    }
}
