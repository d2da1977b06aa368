use serde::{Deserialize, Serialize};

/// Numeric error taxonomy shared by the service and the client. The leading
/// digit groups codes: 1 upload, 2 directories, 3 file processing,
/// 4 vectorization/model, 5 internal, 6 parameters, 7 tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    FileUploadFailed,
    FileNotFound,
    FileTooLarge,
    InvalidFileFormat,
    FileExtractError,
    InvalidFileContent,
    FileDownloadError,
    DirectoryCreateFailed,
    DirectoryNotFound,
    DirectoryAccessDenied,
    FileProcessFailed,
    FileReadError,
    FileWriteError,
    TextProcessError,
    JsonParseError,
    VectorizationFailed,
    ModelError,
    ApiError,
    InvalidApiKey,
    ConfigTestFailed,
    SystemError,
    UnexpectedError,
    InvalidParameter,
    MissingParameter,
    ParameterOutOfRange,
    TaskNotFound,
    TaskCancelled,
    TaskAlreadyCompleted,
    TaskAlreadyCancelled,
}

pub const ALL_ERROR_CODES: [ErrorCode; 29] = [
    ErrorCode::FileUploadFailed,
    ErrorCode::FileNotFound,
    ErrorCode::FileTooLarge,
    ErrorCode::InvalidFileFormat,
    ErrorCode::FileExtractError,
    ErrorCode::InvalidFileContent,
    ErrorCode::FileDownloadError,
    ErrorCode::DirectoryCreateFailed,
    ErrorCode::DirectoryNotFound,
    ErrorCode::DirectoryAccessDenied,
    ErrorCode::FileProcessFailed,
    ErrorCode::FileReadError,
    ErrorCode::FileWriteError,
    ErrorCode::TextProcessError,
    ErrorCode::JsonParseError,
    ErrorCode::VectorizationFailed,
    ErrorCode::ModelError,
    ErrorCode::ApiError,
    ErrorCode::InvalidApiKey,
    ErrorCode::ConfigTestFailed,
    ErrorCode::SystemError,
    ErrorCode::UnexpectedError,
    ErrorCode::InvalidParameter,
    ErrorCode::MissingParameter,
    ErrorCode::ParameterOutOfRange,
    ErrorCode::TaskNotFound,
    ErrorCode::TaskCancelled,
    ErrorCode::TaskAlreadyCompleted,
    ErrorCode::TaskAlreadyCancelled,
];

impl ErrorCode {
    pub fn code(self) -> &'static str {
        match self {
            Self::FileUploadFailed => "1001",
            Self::FileNotFound => "1002",
            Self::FileTooLarge => "1003",
            Self::InvalidFileFormat => "1004",
            Self::FileExtractError => "1005",
            Self::InvalidFileContent => "1006",
            Self::FileDownloadError => "1008",
            Self::DirectoryCreateFailed => "2001",
            Self::DirectoryNotFound => "2002",
            Self::DirectoryAccessDenied => "2003",
            Self::FileProcessFailed => "3001",
            Self::FileReadError => "3002",
            Self::FileWriteError => "3003",
            Self::TextProcessError => "3004",
            Self::JsonParseError => "3005",
            Self::VectorizationFailed => "4001",
            Self::ModelError => "4002",
            Self::ApiError => "4003",
            Self::InvalidApiKey => "4004",
            Self::ConfigTestFailed => "4005",
            Self::SystemError => "5001",
            Self::UnexpectedError => "5002",
            Self::InvalidParameter => "6001",
            Self::MissingParameter => "6002",
            Self::ParameterOutOfRange => "6003",
            Self::TaskNotFound => "7001",
            Self::TaskCancelled => "7002",
            Self::TaskAlreadyCompleted => "7003",
            Self::TaskAlreadyCancelled => "7004",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::FileUploadFailed => "file upload failed",
            Self::FileNotFound => "file not found",
            Self::FileTooLarge => "file exceeds the size limit",
            Self::InvalidFileFormat => "invalid file format",
            Self::FileExtractError => "failed to extract archive",
            Self::InvalidFileContent => "invalid file content",
            Self::FileDownloadError => "file download failed",
            Self::DirectoryCreateFailed => "failed to create directory",
            Self::DirectoryNotFound => "directory not found",
            Self::DirectoryAccessDenied => "directory access denied",
            Self::FileProcessFailed => "file processing failed",
            Self::FileReadError => "file read error",
            Self::FileWriteError => "file write error",
            Self::TextProcessError => "text processing error",
            Self::JsonParseError => "json parse error",
            Self::VectorizationFailed => "vectorization failed",
            Self::ModelError => "model error",
            Self::ApiError => "api call failed",
            Self::InvalidApiKey => "invalid api key",
            Self::ConfigTestFailed => "configuration test failed",
            Self::SystemError => "internal system error",
            Self::UnexpectedError => "unexpected error",
            Self::InvalidParameter => "invalid parameter",
            Self::MissingParameter => "missing required parameter",
            Self::ParameterOutOfRange => "parameter out of range",
            Self::TaskNotFound => "task not found",
            Self::TaskCancelled => "task was cancelled",
            Self::TaskAlreadyCompleted => "task already completed",
            Self::TaskAlreadyCancelled => "task already cancelled",
        }
    }

    pub fn from_code(raw: &str) -> Option<Self> {
        ALL_ERROR_CODES
            .iter()
            .copied()
            .find(|code| code.code() == raw.trim())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Error surfaced across the service boundary: a taxonomy code plus an
/// optional human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub code: ErrorCode,
    pub detail: Option<String>,
}

impl ServiceError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }

    pub fn message(&self) -> &'static str {
        self.code.message()
    }

    pub fn render(&self) -> String {
        match self.detail.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(detail) => format!("{}: {detail}", self.code.message()),
            None => self.code.message().to_string(),
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

impl std::error::Error for ServiceError {}

impl From<ErrorCode> for ServiceError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to create runtime path {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to resolve home directory for docvec state root")]
    HomeDirectoryUnavailable,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique_and_round_trip() {
        let mut seen = std::collections::BTreeSet::new();
        for code in ALL_ERROR_CODES {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
            assert_eq!(ErrorCode::from_code(code.code()), Some(code));
        }
        assert_eq!(ErrorCode::from_code("9999"), None);
    }

    #[test]
    fn service_error_renders_detail_after_message() {
        let err = ServiceError::with_detail(ErrorCode::InvalidParameter, "maxTokensPerChunk must be > 0");
        assert_eq!(
            err.to_string(),
            "invalid parameter: maxTokensPerChunk must be > 0"
        );
        assert_eq!(ServiceError::new(ErrorCode::TaskNotFound).to_string(), "task not found");
    }
}
