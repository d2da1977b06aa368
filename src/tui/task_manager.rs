use crate::client::{CancelResult, PollPolicy, TaskBoard, TaskListWatcher, TaskRow};
use crate::task::TaskStatus;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use ratatui::{Frame, Terminal};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const HINT_TEXT: &str = "Up/Down select, c cancel, d download, r refresh, q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskManagerAction {
    MovePrev,
    MoveNext,
    Cancel,
    Confirm,
    Deny,
    Download,
    Refresh,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskManagerEffect {
    None,
    CancelTask(String),
    DownloadTask(String),
    Refresh,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskManagerState {
    pub selected: usize,
    /// Task waiting for a y/n answer before its cancel request is sent.
    pub confirming: Option<String>,
    pub status_text: String,
}

impl Default for TaskManagerState {
    fn default() -> Self {
        Self {
            selected: 0,
            confirming: None,
            status_text: "loading tasks".to_string(),
        }
    }
}

pub fn action_from_key(key: KeyEvent, confirming: bool) -> Option<TaskManagerAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(TaskManagerAction::Quit);
    }
    if confirming {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(TaskManagerAction::Confirm),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(TaskManagerAction::Deny),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(TaskManagerAction::MovePrev),
        KeyCode::Down | KeyCode::Char('j') => Some(TaskManagerAction::MoveNext),
        KeyCode::Char('c') => Some(TaskManagerAction::Cancel),
        KeyCode::Char('d') => Some(TaskManagerAction::Download),
        KeyCode::Char('r') => Some(TaskManagerAction::Refresh),
        KeyCode::Char('q') | KeyCode::Esc => Some(TaskManagerAction::Quit),
        _ => None,
    }
}

fn clamp_selection(selected: usize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    selected.min(len - 1)
}

pub fn transition(
    state: &mut TaskManagerState,
    rows: &[TaskRow],
    action: TaskManagerAction,
) -> TaskManagerEffect {
    state.selected = clamp_selection(state.selected, rows.len());
    let selected = rows.get(state.selected);
    match action {
        TaskManagerAction::MovePrev => {
            state.selected = state.selected.saturating_sub(1);
            TaskManagerEffect::None
        }
        TaskManagerAction::MoveNext => {
            state.selected = clamp_selection(state.selected + 1, rows.len());
            TaskManagerEffect::None
        }
        TaskManagerAction::Cancel => match selected {
            Some(row) if row.can_cancel() => {
                let id = row.task.id.to_string();
                state.status_text = format!("cancel task {id}? (y/n)");
                state.confirming = Some(id);
                TaskManagerEffect::None
            }
            Some(row) => {
                state.status_text = format!("task is {}, nothing to cancel", row.task.status);
                TaskManagerEffect::None
            }
            None => TaskManagerEffect::None,
        },
        TaskManagerAction::Confirm => match state.confirming.take() {
            Some(id) => TaskManagerEffect::CancelTask(id),
            None => TaskManagerEffect::None,
        },
        TaskManagerAction::Deny => {
            state.confirming = None;
            state.status_text = "cancel aborted".to_string();
            TaskManagerEffect::None
        }
        TaskManagerAction::Download => match selected {
            Some(row) if row.can_download() => {
                TaskManagerEffect::DownloadTask(row.task.id.to_string())
            }
            Some(_) => {
                state.status_text = "only completed tasks can be downloaded".to_string();
                TaskManagerEffect::None
            }
            None => TaskManagerEffect::None,
        },
        TaskManagerAction::Refresh => TaskManagerEffect::Refresh,
        TaskManagerAction::Quit => TaskManagerEffect::Quit,
    }
}

fn apply_effect(
    board: &mut TaskBoard,
    state: &mut TaskManagerState,
    effect: TaskManagerEffect,
    download_dir: &Path,
) -> bool {
    match effect {
        TaskManagerEffect::None => {}
        TaskManagerEffect::Quit => return true,
        TaskManagerEffect::Refresh => {
            state.status_text = match board.refresh() {
                Ok(count) => format!("{count} tasks"),
                Err(err) => err.user_message(),
            };
        }
        TaskManagerEffect::CancelTask(id) => {
            state.status_text = match board.cancel(&id) {
                Ok(CancelResult::Requested) => format!("task {id} cancelled"),
                Ok(CancelResult::NotCancellable) => format!("task {id} is no longer running"),
                Ok(CancelResult::UnknownRow) => format!("task {id} is no longer listed"),
                Err(err) => err.user_message(),
            };
        }
        TaskManagerEffect::DownloadTask(id) => {
            state.status_text = match board.download(&id, download_dir) {
                Ok(Some(artifact)) => format!("saved {}", artifact.path.display()),
                Ok(None) => "only completed tasks can be downloaded".to_string(),
                Err(err) => err.user_message(),
            };
        }
    }
    false
}

pub(crate) fn run_task_manager(
    mut board: TaskBoard,
    policy: PollPolicy,
    download_dir: PathBuf,
) -> Result<String, String> {
    let watcher = TaskListWatcher::start(board.client().clone(), policy)
        .map_err(|e| format!("failed to start task refresh: {e}"))?;

    let mut stdout = io::stdout();
    enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {e}"))?;
    execute!(stdout, EnterAlternateScreen, Hide)
        .map_err(|e| format!("failed to enter task manager screen: {e}"))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal =
        Terminal::new(backend).map_err(|e| format!("failed to create terminal: {e}"))?;
    let result = run_loop(&mut terminal, &mut board, &watcher, &download_dir);
    disable_raw_mode().map_err(|e| format!("failed to disable raw mode: {e}"))?;
    execute!(terminal.backend_mut(), Show, LeaveAlternateScreen)
        .map_err(|e| format!("failed to leave task manager screen: {e}"))?;
    drop(watcher);
    result.map(|()| "task manager closed".to_string())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    board: &mut TaskBoard,
    watcher: &TaskListWatcher,
    download_dir: &Path,
) -> Result<(), String> {
    let mut state = TaskManagerState::default();
    loop {
        if let Some(update) = watcher.latest() {
            match update {
                Ok(tasks) => {
                    board.apply(tasks);
                    if state.confirming.is_none() {
                        state.status_text = format!("{} tasks", board.rows().len());
                    }
                }
                Err(message) => board.record_error(message),
            }
        }
        state.selected = clamp_selection(state.selected, board.rows().len());
        terminal
            .draw(|frame| draw_task_manager(frame, board, &state))
            .map_err(|e| format!("failed to render task manager: {e}"))?;

        if !event::poll(Duration::from_millis(250))
            .map_err(|e| format!("failed to poll input: {e}"))?
        {
            continue;
        }
        let Event::Key(key) = event::read().map_err(|e| format!("failed to read input: {e}"))?
        else {
            continue;
        };
        let Some(action) = action_from_key(key, state.confirming.is_some()) else {
            continue;
        };
        let effect = transition(&mut state, board.rows(), action);
        if apply_effect(board, &mut state, effect, download_dir) {
            return Ok(());
        }
    }
}

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Running => Color::Blue,
        TaskStatus::Completed => Color::Green,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Cancelled => Color::DarkGray,
    }
}

fn draw_task_manager(frame: &mut Frame<'_>, board: &TaskBoard, state: &TaskManagerState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let refreshed = board
        .refreshed_at()
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            "docvec tasks",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("{}  last refresh {refreshed}", board.client().base())),
    ])
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, chunks[0]);

    let head = Row::new(["File", "Model", "Status", "Progress", "Stage", "Created"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = board.rows().iter().enumerate().map(|(idx, row)| {
        let task = &row.task;
        let status = if row.pending_cancel {
            "CANCELLING".to_string()
        } else {
            task.status.to_string()
        };
        let stage = task
            .error_message
            .clone()
            .unwrap_or_else(|| task.current_stage.clone());
        let style = if idx == state.selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(task.file_name.clone()),
            Cell::from(task.model_type.clone()),
            Cell::from(Span::styled(
                status,
                Style::default().fg(status_color(task.status)),
            )),
            Cell::from(format!("{:>3}%", task.progress)),
            Cell::from(stage),
            Cell::from(task.create_time.format("%Y-%m-%d %H:%M").to_string()),
        ])
        .style(style)
    });
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(24),
            Constraint::Percentage(18),
            Constraint::Length(11),
            Constraint::Length(8),
            Constraint::Percentage(26),
            Constraint::Length(16),
        ],
    )
    .header(head)
    .column_spacing(1)
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(table, chunks[1]);

    let mut status = state.status_text.clone();
    if let Some(err) = board.last_error() {
        status = format!("{status} | refresh failed: {err}");
    }
    let footer = Paragraph::new(vec![
        Line::from(HINT_TEXT),
        Line::from(format!("Status: {status}")),
    ])
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, chunks[2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{time::now_utc, TaskId};
    use crate::task::Task;

    fn key_event(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn rows(statuses: &[TaskStatus]) -> Vec<TaskRow> {
        statuses
            .iter()
            .enumerate()
            .map(|(idx, status)| {
                let mut task = Task::new_running(
                    TaskId::parse(&format!("task-{idx}")).expect("id"),
                    "docs.zip",
                    "local-hash",
                    now_utc(),
                );
                task.status = *status;
                TaskRow {
                    task,
                    pending_cancel: false,
                }
            })
            .collect()
    }

    #[test]
    fn confirmation_mode_only_accepts_yes_or_no() {
        assert_eq!(
            action_from_key(key_event(KeyCode::Char('c')), false),
            Some(TaskManagerAction::Cancel)
        );
        assert_eq!(action_from_key(key_event(KeyCode::Char('c')), true), None);
        assert_eq!(
            action_from_key(key_event(KeyCode::Char('y')), true),
            Some(TaskManagerAction::Confirm)
        );
        assert_eq!(
            action_from_key(key_event(KeyCode::Esc), true),
            Some(TaskManagerAction::Deny)
        );
        assert_eq!(
            action_from_key(
                KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
                true
            ),
            Some(TaskManagerAction::Quit)
        );
    }

    #[test]
    fn cancel_requires_confirmation_of_running_row() {
        let rows = rows(&[TaskStatus::Running, TaskStatus::Completed]);
        let mut state = TaskManagerState::default();

        assert_eq!(
            transition(&mut state, &rows, TaskManagerAction::Cancel),
            TaskManagerEffect::None
        );
        assert_eq!(state.confirming.as_deref(), Some("task-0"));
        assert_eq!(
            transition(&mut state, &rows, TaskManagerAction::Confirm),
            TaskManagerEffect::CancelTask("task-0".to_string())
        );
        assert_eq!(state.confirming, None);
        assert_eq!(
            transition(&mut state, &rows, TaskManagerAction::Confirm),
            TaskManagerEffect::None
        );
    }

    #[test]
    fn actions_respect_row_status() {
        let rows = rows(&[TaskStatus::Running, TaskStatus::Completed]);
        let mut state = TaskManagerState::default();
        assert_eq!(
            transition(&mut state, &rows, TaskManagerAction::Download),
            TaskManagerEffect::None
        );
        transition(&mut state, &rows, TaskManagerAction::MoveNext);
        transition(&mut state, &rows, TaskManagerAction::MoveNext);
        assert_eq!(state.selected, 1);
        assert_eq!(
            transition(&mut state, &rows, TaskManagerAction::Download),
            TaskManagerEffect::DownloadTask("task-1".to_string())
        );
        transition(&mut state, &rows, TaskManagerAction::Cancel);
        assert_eq!(state.confirming, None);
    }
}
