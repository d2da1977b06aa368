use crate::shared::{ErrorCode, ServiceError};
use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Multipart form fields collected in one pass: at most one `file` part
/// plus text fields by name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    fields: HashMap<String, String>,
}

fn multipart_error(err: MultipartError) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ServiceError::with_detail(ErrorCode::FileTooLarge, err.body_text());
    }
    ServiceError::with_detail(ErrorCode::FileUploadFailed, err.body_text())
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ServiceError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "file" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.file = Some(UploadedFile {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    /// Trimmed value of a text field; blank values count as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn require_text(&self, name: &str) -> Result<&str, ServiceError> {
        self.text(name).ok_or_else(|| {
            ServiceError::with_detail(ErrorCode::MissingParameter, format!("{name} is required"))
        })
    }

    pub fn integer(&self, name: &str, default: i64) -> Result<i64, ServiceError> {
        match self.text(name) {
            None => Ok(default),
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                ServiceError::with_detail(
                    ErrorCode::InvalidParameter,
                    format!("{name} must be an integer, got `{raw}`"),
                )
            }),
        }
    }

    pub fn take_file(&mut self) -> Result<UploadedFile, ServiceError> {
        self.file
            .take()
            .filter(|file| !file.file_name.trim().is_empty() || !file.bytes.is_empty())
            .ok_or_else(|| ServiceError::with_detail(ErrorCode::MissingParameter, "file is required"))
    }
}
