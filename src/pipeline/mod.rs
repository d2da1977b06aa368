pub mod job;
pub mod prepare;

pub use job::{run_job, run_job_guarded, EmbeddingJob, JobOutcome, PipelineContext};
pub use prepare::{prepare_task, Prepared};
