use crate::shared::{ErrorCode, ServiceError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// JSON envelope shared by every API endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            code: None,
            message: None,
            detail: None,
            data: Some(data),
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ServiceError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidFileFormat
        | ErrorCode::InvalidFileContent
        | ErrorCode::InvalidParameter
        | ErrorCode::MissingParameter
        | ErrorCode::ParameterOutOfRange => StatusCode::BAD_REQUEST,
        ErrorCode::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCode::FileNotFound | ErrorCode::TaskNotFound => StatusCode::NOT_FOUND,
        ErrorCode::TaskCancelled
        | ErrorCode::TaskAlreadyCompleted
        | ErrorCode::TaskAlreadyCancelled => StatusCode::CONFLICT,
        ErrorCode::VectorizationFailed
        | ErrorCode::ModelError
        | ErrorCode::ApiError
        | ErrorCode::InvalidApiKey
        | ErrorCode::ConfigTestFailed => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn troubleshooting(code: ErrorCode) -> Option<&'static str> {
    match code {
        ErrorCode::ApiError => Some(
            "check that the API base URL is reachable and the model name is correct",
        ),
        ErrorCode::InvalidApiKey => Some("verify the API key and its access to the model"),
        ErrorCode::ConfigTestFailed => {
            Some("verify the API base URL, API key and model name, then test again")
        }
        ErrorCode::InvalidFileContent => {
            Some("the archive must contain at least one .md or .json file")
        }
        ErrorCode::FileExtractError => {
            Some("make sure the upload is a valid zip, tar or tar.gz archive")
        }
        ErrorCode::VectorizationFailed => {
            Some("retry the task; if it keeps failing, lower maxTokensPerChunk")
        }
        _ => None,
    }
}

/// `detail` with troubleshooting advice appended for the error families
/// that have some.
pub fn detail_with_advice(err: &ServiceError) -> Option<String> {
    let detail = err.detail.as_deref().filter(|d| !d.trim().is_empty());
    match (detail, troubleshooting(err.code)) {
        (Some(detail), Some(advice)) => Some(format!("{detail}; {advice}")),
        (Some(detail), None) => Some(detail.to_string()),
        (None, Some(advice)) => Some(advice.to_string()),
        (None, None) => None,
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = status_for(self.code);
        if status.is_server_error() {
            tracing::warn!(code = self.code.code(), "{}", self.render());
        }
        let body = ApiResponse::<()> {
            success: false,
            code: Some(self.code.code().to_string()),
            message: Some(self.code.message().to_string()),
            detail: detail_with_advice(&self),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}
