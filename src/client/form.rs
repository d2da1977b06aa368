use crate::config::{DEFAULT_MAX_TOKENS_PER_CHUNK, DEFAULT_OVERLAP_TOKENS};
use crate::embedding::is_local_model;
use crate::ingest::ArchiveFormat;
use std::fmt;
use std::path::PathBuf;

/// Raw values as typed by the user. Integer fields stay textual until
/// validation so that `abc` can be reported against the right field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionForm {
    pub model_type: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub file: Option<PathBuf>,
    pub max_tokens_per_chunk: Option<String>,
    pub overlap_tokens: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub model_type: String,
    pub base_url: String,
    pub api_key: String,
    pub file: PathBuf,
    pub max_tokens_per_chunk: u32,
    pub overlap_tokens: u32,
}

impl Submission {
    pub fn file_name(&self) -> String {
        self.file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn render_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn integer_field(
    raw: &Option<String>,
    field: &'static str,
    default: u32,
    minimum: u32,
    errors: &mut Vec<FieldError>,
) -> u32 {
    let Some(text) = present(raw) else {
        return default;
    };
    let rule = if minimum == 0 {
        "must be a non-negative integer"
    } else {
        "must be a positive integer"
    };
    match text.parse::<u32>() {
        Ok(value) if value >= minimum => value,
        _ => {
            errors.push(FieldError::new(field, rule));
            default
        }
    }
}

impl SubmissionForm {
    /// Checks every field and reports all failures at once.
    pub fn validate(&self) -> Result<Submission, Vec<FieldError>> {
        let mut errors = Vec::new();

        let model_type = present(&self.model_type);
        if model_type.is_none() {
            errors.push(FieldError::new("modelType", "please select a model type"));
        }
        let local = model_type.is_some_and(is_local_model);

        let base_url = present(&self.base_url);
        if !local {
            match base_url {
                None => errors.push(FieldError::new("baseUrl", "please enter the API base URL")),
                Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                    errors.push(FieldError::new(
                        "baseUrl",
                        "the API base URL must start with http:// or https://",
                    ))
                }
                Some(_) => {}
            }
        }
        let api_key = present(&self.api_key);
        if !local && api_key.is_none() {
            errors.push(FieldError::new("apiKey", "please enter the API key"));
        }

        match &self.file {
            None => errors.push(FieldError::new("file", "please upload an archive file")),
            Some(path) => {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if ArchiveFormat::from_file_name(&name).is_none() {
                    errors.push(FieldError::new(
                        "file",
                        "only .zip, .tar, .tar.gz, .tgz and .gz archives are supported",
                    ));
                } else if !path.is_file() {
                    errors.push(FieldError::new(
                        "file",
                        format!("{} does not exist", path.display()),
                    ));
                }
            }
        }

        let max_tokens = integer_field(
            &self.max_tokens_per_chunk,
            "maxTokensPerChunk",
            DEFAULT_MAX_TOKENS_PER_CHUNK,
            1,
            &mut errors,
        );
        let overlap = integer_field(
            &self.overlap_tokens,
            "overlapTokens",
            DEFAULT_OVERLAP_TOKENS,
            0,
            &mut errors,
        );

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Submission {
            model_type: model_type.unwrap_or_default().to_string(),
            base_url: base_url.unwrap_or_default().trim_end_matches('/').to_string(),
            api_key: api_key.unwrap_or_default().to_string(),
            file: self.file.clone().unwrap_or_default(),
            max_tokens_per_chunk: max_tokens,
            overlap_tokens: overlap,
        })
    }
}
