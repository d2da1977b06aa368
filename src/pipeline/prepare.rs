use crate::embedding::EmbeddingStore;
use crate::ingest::{
    collect_source_files, extract_archive, load_document, ArchiveFormat, Document,
};
use crate::shared::fs_atomic::remove_dir_if_exists;
use crate::shared::{ErrorCode, ServiceError};
use crate::task::{Task, TaskTracker};
use std::fs;
use std::path::Path;

/// Result of the synchronous half of a submission.
#[derive(Debug)]
pub enum Prepared {
    /// Every source document was empty; the task is already `COMPLETED`.
    Finished(Task),
    /// Documents are loaded and the task waits for a worker.
    Queued { task: Task, documents: Vec<Document> },
}

impl Prepared {
    pub fn task(&self) -> &Task {
        match self {
            Self::Finished(task) | Self::Queued { task, .. } => task,
        }
    }
}

/// Creates the task, stores and extracts the archive, and loads its sources.
/// Any failure after the task exists marks it `FAILED` and removes its
/// working directory before the error is returned.
pub fn prepare_task(
    tracker: &TaskTracker,
    file_name: &str,
    model_type: &str,
    archive: &[u8],
) -> Result<Prepared, ServiceError> {
    let format = ArchiveFormat::from_file_name(file_name).ok_or_else(|| {
        ServiceError::with_detail(
            ErrorCode::InvalidFileFormat,
            format!("unsupported archive `{file_name}`"),
        )
    })?;
    let task = tracker.create(file_name, model_type)?;
    let upload_dir = tracker.paths().task_upload_dir(&task.id);

    match stage_upload(tracker, &task, format, archive) {
        Ok(documents) if documents.iter().all(Document::is_blank) => {
            let finished = finish_empty(tracker, &task);
            let _ = remove_dir_if_exists(&upload_dir);
            finished.map(Prepared::Finished)
        }
        Ok(documents) => Ok(Prepared::Queued { task, documents }),
        Err(err) => {
            let _ = tracker.fail(&task.id, &err);
            let _ = remove_dir_if_exists(&upload_dir);
            Err(err)
        }
    }
}

fn stage_upload(
    tracker: &TaskTracker,
    task: &Task,
    format: ArchiveFormat,
    archive: &[u8],
) -> Result<Vec<Document>, ServiceError> {
    let paths = tracker.paths();
    let upload_dir = paths.task_upload_dir(&task.id);
    fs::create_dir_all(&upload_dir).map_err(|err| {
        ServiceError::with_detail(
            ErrorCode::DirectoryCreateFailed,
            format!("{}: {err}", upload_dir.display()),
        )
    })?;

    let archive_path = upload_dir.join(format!("upload.{}", format.as_str()));
    fs::write(&archive_path, archive).map_err(|err| {
        ServiceError::with_detail(ErrorCode::FileUploadFailed, err.to_string())
    })?;

    let extract_dir = paths.task_extract_dir(&task.id);
    extract_archive(&archive_path, format, &extract_dir)?;
    remove_archive(&archive_path);

    let sources = collect_source_files(&extract_dir)?;
    if sources.is_empty() {
        return Err(ServiceError::with_detail(
            ErrorCode::InvalidFileContent,
            "archive contains no .md or .json files",
        ));
    }

    let mut documents = Vec::with_capacity(sources.len());
    for source in &sources {
        documents.push(load_document(source)?);
    }
    Ok(documents)
}

fn remove_archive(path: &Path) {
    let _ = fs::remove_file(path);
}

fn finish_empty(tracker: &TaskTracker, task: &Task) -> Result<Task, ServiceError> {
    let vector_path = tracker.paths().task_vector_path(&task.id);
    let sha256 = EmbeddingStore::new().write_to(&vector_path)?;
    tracker.complete(&task.id, &vector_path, &sha256, 0)?;
    tracker.get(&task.id)
}
