use super::error::ClientError;
use super::form::Submission;
use crate::server::embedding_routes::{ProcessData, TestConfigData};
use crate::server::{ApiResponse, HealthResponse};
use crate::shared::fs_atomic::{atomic_write_file, sha256_hex};
use crate::task::Task;
use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_DISPOSITION, ETAG};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A vector file saved by [`ApiClient::download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: usize,
    /// The server sent an `ETag` and it matched the content.
    pub verified: bool,
}

/// Blocking client for the service's `/api` surface.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    http: Client,
}

impl ApiClient {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = api_base.trim().trim_end_matches('/').to_string();
        let http = Client::builder().timeout(timeout).build().map_err(|err| {
            ClientError::Transport {
                url: base.clone(),
                message: err.to_string(),
            }
        })?;
        Ok(Self { base, http })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn download_url(&self, task_id: &str) -> String {
        self.url(&format!(
            "/api/embedding/download/{}",
            urlencoding::encode(task_id)
        ))
    }

    pub fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = self.url("/api/health");
        let response = send(&url, self.http.get(&url))?;
        let status = response.status();
        let body = response.text().map_err(|err| transport(&url, err))?;
        if !status.is_success() {
            return Err(api_error_from_body(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|err| ClientError::Decode {
            url,
            message: err.to_string(),
        })
    }

    pub fn test_config(&self, submission: &Submission) -> Result<TestConfigData, ClientError> {
        let url = self.url("/api/embedding/test");
        let form = base_form(submission)?;
        let response = send(&url, self.http.post(&url).multipart(form))?;
        decode(&url, response)
    }

    pub fn submit(&self, submission: &Submission) -> Result<ProcessData, ClientError> {
        let url = self.url("/api/embedding/process");
        let form = base_form(submission)?
            .text(
                "maxTokensPerChunk",
                submission.max_tokens_per_chunk.to_string(),
            )
            .text("overlapTokens", submission.overlap_tokens.to_string());
        let response = send(&url, self.http.post(&url).multipart(form))?;
        decode(&url, response)
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let url = self.url("/api/tasks");
        let response = send(&url, self.http.get(&url))?;
        decode(&url, response)
    }

    pub fn get_task(&self, task_id: &str) -> Result<Task, ClientError> {
        let url = self.url(&format!("/api/tasks/{}", urlencoding::encode(task_id)));
        let response = send(&url, self.http.get(&url))?;
        decode(&url, response)
    }

    pub fn cancel_task(&self, task_id: &str) -> Result<(), ClientError> {
        let url = self.url(&format!(
            "/api/tasks/{}/cancel",
            urlencoding::encode(task_id)
        ));
        let response = send(&url, self.http.post(&url))?;
        decode_envelope::<Value>(&url, response).map(|_| ())
    }

    /// Saves the vector file of a completed task into `dir` and checks it
    /// against the `ETag` checksum when the server sends one.
    pub fn download(&self, task_id: &str, dir: &Path) -> Result<DownloadedArtifact, ClientError> {
        let url = self.download_url(task_id);
        let response = send(&url, self.http.get(&url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().map_err(|err| transport(&url, err))?;
            return Err(api_error_from_body(status.as_u16(), &body));
        }

        let headers = response.headers();
        let expected = headers
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().trim_start_matches("W/").trim_matches('"').to_string())
            .filter(|value| !value.is_empty());
        let file_name = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_file_name)
            .unwrap_or_else(|| format!("{task_id}_vectors.json"));

        let bytes = response.bytes().map_err(|err| transport(&url, err))?;
        let sha256 = sha256_hex(&bytes);
        if let Some(expected) = &expected {
            if !expected.eq_ignore_ascii_case(&sha256) {
                return Err(ClientError::Integrity {
                    expected: expected.clone(),
                    actual: sha256,
                });
            }
        }

        fs::create_dir_all(dir).map_err(|source| ClientError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = dir.join(file_name);
        atomic_write_file(&path, &bytes).map_err(|source| ClientError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(DownloadedArtifact {
            path,
            sha256,
            bytes: bytes.len(),
            verified: expected.is_some(),
        })
    }
}

fn base_form(submission: &Submission) -> Result<Form, ClientError> {
    Form::new()
        .text("modelType", submission.model_type.clone())
        .text("baseUrl", submission.base_url.clone())
        .text("apiKey", submission.api_key.clone())
        .file("file", &submission.file)
        .map_err(|source| ClientError::Io {
            path: submission.file.display().to_string(),
            source,
        })
}

fn send(url: &str, request: RequestBuilder) -> Result<Response, ClientError> {
    request.send().map_err(|err| transport(url, err))
}

fn transport(url: &str, err: reqwest::Error) -> ClientError {
    ClientError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ClientError> {
    decode_envelope(url, response)?
        .data
        .ok_or_else(|| ClientError::Decode {
            url: url.to_string(),
            message: "response has no data".to_string(),
        })
}

fn decode_envelope<T: DeserializeOwned>(
    url: &str,
    response: Response,
) -> Result<ApiResponse<T>, ClientError> {
    let status = response.status();
    let body = response.text().map_err(|err| transport(url, err))?;
    let envelope: ApiResponse<T> = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => return Err(api_error_from_body(status.as_u16(), &body)),
        Err(err) => {
            return Err(ClientError::Decode {
                url: url.to_string(),
                message: err.to_string(),
            })
        }
    };
    if !envelope.success || !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            code: envelope.code,
            message: envelope.message,
            detail: envelope.detail,
        });
    }
    Ok(envelope)
}

/// Error envelope when the body has one, otherwise the raw body text.
fn api_error_from_body(status: u16, body: &str) -> ClientError {
    match serde_json::from_str::<ApiResponse<Value>>(body) {
        Ok(envelope) => ClientError::Api {
            status,
            code: envelope.code,
            message: envelope.message,
            detail: envelope.detail,
        },
        Err(_) => ClientError::Api {
            status,
            code: None,
            message: Some(body.trim().chars().take(200).collect::<String>())
                .filter(|text| !text.is_empty()),
            detail: None,
        },
    }
}

/// `filename="..."` from a `Content-Disposition` value, reduced to its last
/// path component.
fn disposition_file_name(value: &str) -> Option<String> {
    let start = value.find("filename=")? + "filename=".len();
    let raw = value[start..].split(';').next()?.trim().trim_matches('"');
    let name = Path::new(raw).file_name()?.to_string_lossy().into_owned();
    (!name.is_empty() && name != "..").then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_name_is_reduced_to_a_file_name() {
        assert_eq!(
            disposition_file_name("attachment; filename=\"docs_vectors.json\"").as_deref(),
            Some("docs_vectors.json")
        );
        assert_eq!(
            disposition_file_name("attachment; filename=\"../../etc/passwd\"").as_deref(),
            Some("passwd")
        );
        assert_eq!(disposition_file_name("attachment"), None);
    }

    #[test]
    fn error_body_without_envelope_keeps_text() {
        match api_error_from_body(502, "Bad Gateway") {
            ClientError::Api {
                status, message, ..
            } => {
                assert_eq!(status, 502);
                assert_eq!(message.as_deref(), Some("Bad Gateway"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn download_url_encodes_the_id() {
        let client = ApiClient::new("http://localhost:8080/", Duration::from_secs(1))
            .expect("client");
        assert_eq!(client.base(), "http://localhost:8080");
        assert_eq!(
            client.download_url("a b"),
            "http://localhost:8080/api/embedding/download/a%20b"
        );
    }
}
