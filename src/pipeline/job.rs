use crate::embedding::{EmbedderFactory, EmbedderSpec, EmbeddingStore};
use crate::ingest::{split_document, Document, Segment, SplitterConfig, TokenCount};
use crate::runtime::logging::{append_service_event, log_fields};
use crate::shared::fs_atomic::remove_dir_if_exists;
use crate::shared::{EntryId, ErrorCode, ServiceError, TaskId};
use crate::task::{percent_of, Stage, TaskTracker};
use serde_json::json;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

const PROGRESS_LOG_EVERY: usize = 10;

#[derive(Debug)]
pub struct EmbeddingJob {
    pub task_id: TaskId,
    pub documents: Vec<Document>,
    pub splitter: SplitterConfig,
    pub embedder: EmbedderSpec,
}

#[derive(Clone)]
pub struct PipelineContext {
    pub tracker: TaskTracker,
    pub embedders: Arc<dyn EmbedderFactory>,
    pub tokens: Arc<dyn TokenCount>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { segment_count: u64, sha256: String },
    Cancelled,
    Failed(ServiceError),
}

enum Interrupt {
    Cancelled,
    Failed(ServiceError),
}

impl From<ServiceError> for Interrupt {
    fn from(err: ServiceError) -> Self {
        Self::Failed(err)
    }
}

/// Runs the job and converts a panic inside it into a `4001` failure.
pub fn run_job_guarded(ctx: &PipelineContext, job: EmbeddingJob) -> JobOutcome {
    let task_id = job.task_id.clone();
    match panic::catch_unwind(AssertUnwindSafe(|| run_job(ctx, job))) {
        Ok(outcome) => outcome,
        Err(_) => {
            let err = ServiceError::with_detail(
                ErrorCode::VectorizationFailed,
                "embedding worker stopped unexpectedly",
            );
            let _ = ctx.tracker.fail(&task_id, &err);
            let _ = remove_dir_if_exists(&ctx.tracker.paths().task_upload_dir(&task_id));
            JobOutcome::Failed(err)
        }
    }
}

pub fn run_job(ctx: &PipelineContext, job: EmbeddingJob) -> JobOutcome {
    let task_id = job.task_id.clone();
    let outcome = match execute(ctx, job) {
        Ok((segment_count, sha256)) => JobOutcome::Completed {
            segment_count,
            sha256,
        },
        Err(Interrupt::Cancelled) => JobOutcome::Cancelled,
        Err(Interrupt::Failed(err)) => {
            let _ = ctx.tracker.fail(&task_id, &err);
            JobOutcome::Failed(err)
        }
    };
    let _ = remove_dir_if_exists(&ctx.tracker.paths().task_upload_dir(&task_id));
    outcome
}

fn ensure_running(ctx: &PipelineContext, task_id: &TaskId) -> Result<(), Interrupt> {
    if ctx.tracker.is_cancelled(task_id)? {
        return Err(Interrupt::Cancelled);
    }
    Ok(())
}

fn execute(ctx: &PipelineContext, job: EmbeddingJob) -> Result<(u64, String), Interrupt> {
    let tracker = &ctx.tracker;
    let task_id = &job.task_id;
    ensure_running(ctx, task_id)?;

    tracker.set_stage(task_id, Stage::Segmenting)?;
    let mut segments: Vec<Segment> = Vec::new();
    let total_documents = job.documents.len();
    for (index, document) in job.documents.iter().enumerate() {
        ensure_running(ctx, task_id)?;
        segments.extend(split_document(document, job.splitter, ctx.tokens.as_ref()));
        tracker.record_segment_progress(task_id, percent_of(index + 1, total_documents))?;
    }

    ensure_running(ctx, task_id)?;
    tracker.set_stage(task_id, Stage::Embedding)?;
    let embedder = ctx.embedders.build(&job.embedder);
    let mut store = EmbeddingStore::new();
    let total_segments = segments.len();
    for (index, segment) in segments.iter().enumerate() {
        ensure_running(ctx, task_id)?;
        let vector = embedder.embed(&segment.text).map_err(ServiceError::from)?;
        let entry_id = EntryId::generate().map_err(|err| {
            ServiceError::with_detail(ErrorCode::VectorizationFailed, err.to_string())
        })?;
        store.add(entry_id, vector, segment);

        let done = index + 1;
        tracker.record_embedding_progress(task_id, percent_of(done, total_segments))?;
        if done % PROGRESS_LOG_EVERY == 0 || done == total_segments {
            append_service_event(
                tracker.paths(),
                "info",
                "job.progress",
                "embedding progress",
                log_fields([
                    ("taskId", json!(task_id.as_str())),
                    ("embedded", json!(done)),
                    ("total", json!(total_segments)),
                ]),
            );
        }
    }

    ensure_running(ctx, task_id)?;
    let vector_path = tracker.paths().task_vector_path(task_id);
    let sha256 = store.write_to(&vector_path).map_err(ServiceError::from)?;
    let segment_count = store.len() as u64;
    if !tracker.complete(task_id, &vector_path, &sha256, segment_count)? {
        let _ = fs::remove_file(&vector_path);
        return Err(Interrupt::Cancelled);
    }
    Ok((segment_count, sha256))
}
