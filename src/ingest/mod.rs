pub mod archive;
pub mod documents;
pub mod splitter;
pub mod tokens;

use crate::shared::{ErrorCode, ServiceError};

pub use archive::{
    entry_names, extract_archive, safe_relative_path, ArchiveError, ArchiveFormat,
    SUPPORTED_ARCHIVE_EXTENSIONS,
};
pub use documents::{
    collect_source_files, is_source_name, load_document, Document, SourceFile, SourceKind,
};
pub use splitter::{split_document, split_text, Segment, SplitterConfig};
pub use tokens::{HeuristicTokenizer, TokenCount};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ArchiveError> for ServiceError {
    fn from(err: ArchiveError) -> Self {
        let code = match err {
            ArchiveError::Unsupported(_) => ErrorCode::InvalidFileFormat,
            _ => ErrorCode::FileExtractError,
        };
        ServiceError::with_detail(code, err.to_string())
    }
}

impl From<IngestError> for ServiceError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Archive(inner) => inner.into(),
            IngestError::Read { .. } => {
                ServiceError::with_detail(ErrorCode::FileReadError, err.to_string())
            }
            IngestError::Json { .. } => {
                ServiceError::with_detail(ErrorCode::JsonParseError, err.to_string())
            }
        }
    }
}
