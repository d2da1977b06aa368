use super::api::ApiClient;
use super::error::ClientError;
use super::form::{render_field_errors, FieldError, SubmissionForm};
use super::messages::resolve_message;
use super::poller::{poll_until, PollOutcome, PollPolicy, PollStep};
use super::progress::StageBoard;
use crate::server::embedding_routes::TestConfigData;
use crate::task::{Task, TaskStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("{}", render_field_errors(.0))]
    Invalid(Vec<FieldError>),
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl SubmissionError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(errors) => render_field_errors(errors),
            Self::Client(err) => err.user_message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    Tested(TestConfigData),
    Submitted { task_id: String, synchronous: bool },
    Progress { task: Task, board: StageBoard },
    PollFailed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Completed { task: Task, download_url: String },
    Failed { task: Task, message: String },
    Cancelled { task_id: String },
    PollingAborted { task_id: String, message: String },
    /// The task keeps running on the service; nobody is watching it here.
    Detached { task_id: String },
}

/// The task currently followed by a flow, shared with whoever may cancel it.
#[derive(Debug, Default)]
pub struct FlowControl {
    task_id: Mutex<Option<String>>,
    stop: AtomicBool,
    cancelled: AtomicBool,
}

impl FlowControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_id(&self) -> Option<String> {
        self.lock().clone()
    }

    pub fn stop_flag(&self) -> &AtomicBool {
        &self.stop
    }

    /// Cancels the followed task. On success polling stops and the task is
    /// forgotten; on failure the reference is kept.
    pub fn cancel(&self, client: &ApiClient) -> Result<Option<String>, ClientError> {
        let mut held = self.lock();
        let Some(task_id) = held.clone() else {
            return Ok(None);
        };
        client.cancel_task(&task_id)?;
        *held = None;
        self.cancelled.store(true, Ordering::Relaxed);
        self.stop.store(true, Ordering::Relaxed);
        Ok(Some(task_id))
    }

    fn hold(&self, task_id: &str) {
        *self.lock() = Some(task_id.to_string());
    }

    fn release(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.task_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Validate, test, submit, then follow the task until it is terminal.
#[derive(Debug, Clone)]
pub struct SubmissionFlow {
    pub client: ApiClient,
    pub policy: PollPolicy,
    pub run_test: bool,
    pub wait: bool,
}

impl SubmissionFlow {
    pub fn new(client: ApiClient, policy: PollPolicy) -> Self {
        Self {
            client,
            policy,
            run_test: true,
            wait: true,
        }
    }

    pub fn run<F>(
        &self,
        form: &SubmissionForm,
        control: &FlowControl,
        mut on_event: F,
    ) -> Result<SubmissionOutcome, SubmissionError>
    where
        F: FnMut(&FlowEvent),
    {
        let submission = form.validate().map_err(SubmissionError::Invalid)?;
        if self.run_test {
            let tested = self.client.test_config(&submission)?;
            on_event(&FlowEvent::Tested(tested));
        }
        let process = self.client.submit(&submission)?;
        let task_id = process.task_id.clone();
        on_event(&FlowEvent::Submitted {
            task_id: task_id.clone(),
            synchronous: process.synchronous,
        });

        if process.synchronous {
            let task = self.client.get_task(&task_id)?;
            return Ok(self
                .terminal_outcome(task)
                .unwrap_or(SubmissionOutcome::Detached { task_id }));
        }
        if !self.wait {
            return Ok(SubmissionOutcome::Detached { task_id });
        }

        control.hold(&task_id);
        let outcome = self.follow(&task_id, control, &mut on_event);
        control.release();
        outcome
    }

    fn follow<F>(
        &self,
        task_id: &str,
        control: &FlowControl,
        on_event: &mut F,
    ) -> Result<SubmissionOutcome, SubmissionError>
    where
        F: FnMut(&FlowEvent),
    {
        let polled = poll_until(&self.policy, control.stop_flag(), || {
            match self.client.get_task(task_id) {
                Ok(task) => {
                    let terminal = task.is_terminal();
                    on_event(&FlowEvent::Progress {
                        board: StageBoard::from_task(&task),
                        task: task.clone(),
                    });
                    if terminal {
                        Ok(PollStep::Done(Ok(task)))
                    } else {
                        Ok(PollStep::Continue)
                    }
                }
                Err(err) if err.is_transient() => {
                    on_event(&FlowEvent::PollFailed {
                        message: err.user_message(),
                    });
                    Err(err)
                }
                Err(err) => Ok(PollStep::Done(Err(err))),
            }
        });

        match polled {
            PollOutcome::Done(Ok(task)) => {
                let task_id = task.id.to_string();
                Ok(self
                    .terminal_outcome(task)
                    .unwrap_or(SubmissionOutcome::Detached { task_id }))
            }
            PollOutcome::Done(Err(err)) => Err(err.into()),
            PollOutcome::GaveUp(err) => Ok(SubmissionOutcome::PollingAborted {
                task_id: task_id.to_string(),
                message: err.user_message(),
            }),
            PollOutcome::Stopped if control.cancelled.load(Ordering::Relaxed) => {
                Ok(SubmissionOutcome::Cancelled {
                    task_id: task_id.to_string(),
                })
            }
            PollOutcome::Stopped => Ok(SubmissionOutcome::Detached {
                task_id: task_id.to_string(),
            }),
        }
    }

    fn terminal_outcome(&self, task: Task) -> Option<SubmissionOutcome> {
        match task.status {
            TaskStatus::Running => None,
            TaskStatus::Completed => Some(SubmissionOutcome::Completed {
                download_url: self.client.download_url(task.id.as_str()),
                task,
            }),
            TaskStatus::Failed => Some(SubmissionOutcome::Failed {
                message: resolve_message(
                    task.error_message.as_deref(),
                    task.error_code.as_deref(),
                    None,
                ),
                task,
            }),
            TaskStatus::Cancelled => Some(SubmissionOutcome::Cancelled {
                task_id: task.id.to_string(),
            }),
        }
    }
}
