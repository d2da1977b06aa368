use super::response::{ok, ApiResult};
use super::upload::{UploadForm, UploadedFile};
use super::{blocking, parse_task_id, AppState};
use crate::embedding::{is_local_model, probe_embedder, EmbedderSpec, EmbeddingError};
use crate::ingest::{entry_names, is_source_name, ArchiveFormat, SplitterConfig};
use crate::pipeline::{prepare_task, run_job_guarded, EmbeddingJob, Prepared};
use crate::shared::{ErrorCode, ServiceError};
use crate::task::TaskStatus;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfigData {
    pub message: String,
    pub has_source_files: bool,
    pub api_tested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessData {
    pub task_id: String,
    /// The task was already terminal when the response was sent.
    pub synchronous: bool,
}

/// A validated `process` submission.
#[derive(Debug)]
pub struct ProcessRequest {
    pub file: UploadedFile,
    pub format: ArchiveFormat,
    pub embedder: EmbedderSpec,
    pub splitter: SplitterConfig,
}

pub fn validate_process_request(
    mut form: UploadForm,
    state: &AppState,
) -> Result<ProcessRequest, ServiceError> {
    let chunking = state.settings.chunking;
    let max_tokens = form.integer(
        "maxTokensPerChunk",
        i64::from(chunking.max_tokens_per_chunk),
    )?;
    if max_tokens <= 0 {
        return Err(ServiceError::with_detail(
            ErrorCode::InvalidParameter,
            "maxTokensPerChunk must be greater than 0",
        ));
    }
    let overlap = form.integer("overlapTokens", i64::from(chunking.overlap_tokens))?;
    if overlap < 0 {
        return Err(ServiceError::with_detail(
            ErrorCode::InvalidParameter,
            "overlapTokens must not be negative",
        ));
    }
    if overlap >= max_tokens {
        return Err(ServiceError::with_detail(
            ErrorCode::ParameterOutOfRange,
            "overlapTokens must be less than maxTokensPerChunk",
        ));
    }

    let file = form.take_file()?;
    let format = check_archive(&file, state)?;
    let embedder = embedder_spec(&form, state)?;

    Ok(ProcessRequest {
        file,
        format,
        embedder,
        splitter: SplitterConfig::new(max_tokens as usize, overlap as usize),
    })
}

fn check_archive(file: &UploadedFile, state: &AppState) -> Result<ArchiveFormat, ServiceError> {
    let format = ArchiveFormat::from_file_name(&file.file_name).ok_or_else(|| {
        ServiceError::with_detail(
            ErrorCode::InvalidFileFormat,
            format!(
                "`{}` is not a zip, tar, tar.gz, tgz or gz archive",
                file.file_name
            ),
        )
    })?;
    let limit = state.settings.server.max_upload_bytes();
    if file.bytes.len() as u64 > limit {
        return Err(ServiceError::with_detail(
            ErrorCode::FileTooLarge,
            format!("limit is {} MB", state.settings.server.max_upload_mb),
        ));
    }
    Ok(format)
}

fn embedder_spec(form: &UploadForm, state: &AppState) -> Result<EmbedderSpec, ServiceError> {
    let model_type = form.require_text("modelType")?.to_string();
    let local = is_local_model(&model_type);
    let base_url = form.text("baseUrl").unwrap_or_default().to_string();
    let api_key = form.text("apiKey").unwrap_or_default().to_string();
    if !local && base_url.is_empty() {
        return Err(ServiceError::with_detail(
            ErrorCode::ApiError,
            "baseUrl is required",
        ));
    }
    if !local && api_key.is_empty() {
        return Err(ServiceError::with_detail(
            ErrorCode::InvalidApiKey,
            "apiKey is required",
        ));
    }
    Ok(EmbedderSpec {
        model_type,
        base_url,
        api_key,
        timeout: state.settings.embedding.request_timeout(),
    })
}

pub async fn test_config(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<TestConfigData> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.take_file()?;
    let format = check_archive(&file, &state)?;
    let spec = embedder_spec(&form, &state)?;
    let factory = Arc::clone(&state.pipeline.embedders);

    blocking(move || {
        let names = entry_names(&file.bytes, format)?;
        if !names.iter().any(|name| is_source_name(name)) {
            return Err(ServiceError::with_detail(
                ErrorCode::InvalidFileContent,
                "archive contains no .md or .json files",
            ));
        }
        let embedder = factory.build(&spec);
        probe_embedder(embedder.as_ref()).map_err(|err| match err {
            EmbeddingError::InvalidApiKey(_) => ServiceError::from(err),
            other => ServiceError::with_detail(ErrorCode::ConfigTestFailed, other.to_string()),
        })?;
        Ok(())
    })
    .await?;

    ok(TestConfigData {
        message: "configuration test passed".to_string(),
        has_source_files: true,
        api_tested: true,
    })
}

pub async fn process(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<ProcessData> {
    let form = UploadForm::read(multipart).await?;
    let request = validate_process_request(form, &state)?;

    let worker_state = Arc::clone(&state);
    let data = blocking(move || submit(&worker_state, request)).await?;
    ok(data)
}

fn submit(state: &AppState, request: ProcessRequest) -> Result<ProcessData, ServiceError> {
    let tracker = &state.pipeline.tracker;
    let prepared = prepare_task(
        tracker,
        &request.file.file_name,
        &request.embedder.model_type,
        &request.file.bytes,
    )?;
    let (task, documents) = match prepared {
        Prepared::Finished(task) => {
            return Ok(ProcessData {
                task_id: task.id.to_string(),
                synchronous: true,
            })
        }
        Prepared::Queued { task, documents } => (task, documents),
    };

    let job = EmbeddingJob {
        task_id: task.id.clone(),
        documents,
        splitter: request.splitter,
        embedder: request.embedder,
    };
    let ctx = state.pipeline.clone();
    let spawned = state
        .runner
        .spawn(&format!("embed-{}", task.id), move || {
            run_job_guarded(&ctx, job);
        });
    if let Err(err) = spawned {
        let err = ServiceError::with_detail(ErrorCode::SystemError, err.to_string());
        let _ = tracker.fail(&task.id, &err);
        return Err(err);
    }

    Ok(ProcessData {
        task_id: task.id.to_string(),
        synchronous: false,
    })
}

/// `<name without archive suffix>_vectors.json`, restricted to a safe
/// character set.
pub fn download_file_name(file_name: &str) -> String {
    let lower = file_name.to_ascii_lowercase();
    let stem_len = [".tar.gz", ".tgz", ".zip", ".tar", ".gz"]
        .iter()
        .find(|suffix| lower.ends_with(*suffix))
        .map(|suffix| file_name.len() - suffix.len())
        .unwrap_or(file_name.len());
    let stem = file_name
        .get(..stem_len)
        .unwrap_or(file_name)
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        return "vectors.json".to_string();
    }
    format!("{stem}_vectors.json")
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, ServiceError> {
    let task_id = parse_task_id(&raw_id)?;
    let tracker = state.pipeline.tracker.clone();
    let task = blocking(move || tracker.get(&task_id)).await?;
    if task.status != TaskStatus::Completed {
        return Err(ServiceError::with_detail(
            ErrorCode::FileNotFound,
            format!("task status is {}", task.status),
        ));
    }
    let path = task
        .vector_file_path
        .clone()
        .ok_or_else(|| ServiceError::with_detail(ErrorCode::FileNotFound, "no vector file"))?;
    let bytes = tokio::fs::read(&path).await.map_err(|err| {
        ServiceError::with_detail(ErrorCode::FileNotFound, format!("{}: {err}", path.display()))
    })?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download_file_name(&task.file_name)
    );
    let etag = format!(
        "\"{}\"",
        task.artifact_sha256
            .unwrap_or_else(|| crate::shared::fs_atomic::sha256_hex(&bytes))
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::ETAG, etag),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_names_drop_archive_suffix() {
        assert_eq!(download_file_name("docs.zip"), "docs_vectors.json");
        assert_eq!(download_file_name("My Docs.tar.gz"), "My_Docs_vectors.json");
        assert_eq!(download_file_name("notes.TGZ"), "notes_vectors.json");
        assert_eq!(download_file_name("文档.zip"), "___vectors.json");
        assert_eq!(download_file_name(".zip"), "vectors.json");
    }
}
