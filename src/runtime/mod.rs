pub mod job_runner;
pub mod logging;
pub mod recovery;
pub mod state_paths;
pub mod worker_primitives;

pub use crate::shared::errors::RuntimeError;
pub(crate) use crate::shared::time::now_secs;
pub use job_runner::JobRunner;
pub use logging::{append_service_event, append_service_log, log_fields};
pub use recovery::{recover_interrupted_tasks, INTERRUPTED_DETAIL};
pub use state_paths::{bootstrap_state_root, default_state_root_path, StatePaths};
pub use worker_primitives::sleep_with_stop;
