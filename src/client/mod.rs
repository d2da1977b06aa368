//! Command-line client for the vectorization service.

pub mod api;
pub mod error;
pub mod form;
pub mod messages;
pub mod poller;
pub mod presets;
pub mod progress;
pub mod submission;
pub mod task_board;

pub use api::{ApiClient, DownloadedArtifact};
pub use error::ClientError;
pub use form::{render_field_errors, FieldError, Submission, SubmissionForm};
pub use messages::{hint_for_code, resolve_message, GENERIC_FAILURE, NETWORK_ERROR};
pub use poller::{poll_until, PollHandle, PollOutcome, PollPolicy, PollStep};
pub use presets::{model_preset, ModelPreset, API_URL_PRESETS, MODEL_PRESETS};
pub use progress::{StageBoard, StageStep, StepState};
pub use submission::{FlowControl, FlowEvent, SubmissionError, SubmissionFlow, SubmissionOutcome};
pub use task_board::{CancelResult, TaskBoard, TaskListWatcher, TaskRow};
