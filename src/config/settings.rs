use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_TOKENS_PER_CHUNK: u32 = 1000;
pub const DEFAULT_OVERLAP_TOKENS: u32 = 10;
pub const API_BASE_ENV: &str = "DOCVEC_API_BASE";
pub const API_KEY_ENV: &str = "DOCVEC_API_KEY";

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_mb() -> u64 {
    100
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_api_base() -> String {
    "http://localhost:8080".to_string()
}

fn default_progress_poll_ms() -> u64 {
    1000
}

fn default_task_list_poll_ms() -> u64 {
    5000
}

fn default_max_backoff_ms() -> u64 {
    8000
}

fn default_max_poll_failures() -> u32 {
    5
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_client_timeout_secs() -> u64 {
    120
}

fn default_max_tokens_per_chunk() -> u32 {
    DEFAULT_MAX_TOKENS_PER_CHUNK
}

fn default_overlap_tokens() -> u32 {
    DEFAULT_OVERLAP_TOKENS
}

fn default_embedding_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding the bundled browser front end, served with an
    /// `index.html` fallback.
    pub static_dir: Option<PathBuf>,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            static_dir: None,
            max_upload_mb: default_max_upload_mb(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_progress_poll_ms")]
    pub progress_poll_ms: u64,
    #[serde(default = "default_task_list_poll_ms")]
    pub task_list_poll_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default = "default_client_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            progress_poll_ms: default_progress_poll_ms(),
            task_list_poll_ms: default_task_list_poll_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_poll_failures: default_max_poll_failures(),
            download_dir: default_download_dir(),
            request_timeout_secs: default_client_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// The configured base URL, overridden by `DOCVEC_API_BASE` when set.
    pub fn resolved_api_base(&self) -> String {
        std::env::var(API_BASE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.api_base.clone())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_ms)
    }

    pub fn task_list_interval(&self) -> Duration {
        Duration::from_millis(self.task_list_poll_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens_per_chunk")]
    pub max_tokens_per_chunk: u32,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: u32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: default_max_tokens_per_chunk(),
            overlap_tokens: default_overlap_tokens(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Reads `path` when it exists, otherwise returns the defaults.
    pub fn from_path_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_path(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Settings(
                "server.bind must be non-empty".to_string(),
            ));
        }
        if self.server.max_upload_mb == 0 {
            return Err(ConfigError::Settings(
                "server.max_upload_mb must be greater than 0".to_string(),
            ));
        }
        if self.server.max_concurrent_jobs == 0 {
            return Err(ConfigError::Settings(
                "server.max_concurrent_jobs must be greater than 0".to_string(),
            ));
        }
        if self.client.api_base.trim().is_empty() {
            return Err(ConfigError::Settings(
                "client.api_base must be non-empty".to_string(),
            ));
        }
        for (name, value) in [
            ("client.progress_poll_ms", self.client.progress_poll_ms),
            ("client.task_list_poll_ms", self.client.task_list_poll_ms),
            ("client.max_backoff_ms", self.client.max_backoff_ms),
            ("client.request_timeout_secs", self.client.request_timeout_secs),
            (
                "embedding.request_timeout_secs",
                self.embedding.request_timeout_secs,
            ),
        ] {
            if value == 0 {
                return Err(ConfigError::Settings(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        if self.client.max_poll_failures == 0 {
            return Err(ConfigError::Settings(
                "client.max_poll_failures must be greater than 0".to_string(),
            ));
        }
        if self.chunking.max_tokens_per_chunk == 0 {
            return Err(ConfigError::Settings(
                "chunking.max_tokens_per_chunk must be greater than 0".to_string(),
            ));
        }
        if self.chunking.overlap_tokens >= self.chunking.max_tokens_per_chunk {
            return Err(ConfigError::Settings(
                "chunking.overlap_tokens must be less than chunking.max_tokens_per_chunk"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
