pub mod model;
pub mod repository;
pub mod tracker;

pub use model::{overall_progress, percent_of, Stage, Task, TaskStatus};
pub use repository::{ProgressUpdate, TaskRepository, TaskRepositoryError};
pub use tracker::{CancelOutcome, TaskTracker};
