pub mod hashing;
pub mod openai;
pub mod store;

use crate::shared::{ErrorCode, ServiceError};
use std::time::Duration;

pub use hashing::{HashingEmbedder, HASH_EMBEDDING_DIM};
pub use openai::OpenAiCompatibleEmbedder;
pub use store::{EmbeddingStore, StoreEntry, StoreError};

/// Model name of the offline embedder, which needs no URL or key.
pub const LOCAL_HASH_MODEL: &str = "local-hash";

pub const PROBE_TEXT: &str = "connectivity check";

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding provider rejected the api key ({0})")]
    InvalidApiKey(String),
    #[error("embedding provider returned an error ({0})")]
    Api(String),
    #[error("embedding provider unreachable: {0}")]
    Transport(String),
    #[error("embedding response could not be decoded: {0}")]
    Decode(String),
    #[error("embedding response contained no vector")]
    EmptyResponse,
}

impl From<EmbeddingError> for ServiceError {
    fn from(err: EmbeddingError) -> Self {
        let code = match err {
            EmbeddingError::InvalidApiKey(_) => ErrorCode::InvalidApiKey,
            _ => ErrorCode::ApiError,
        };
        ServiceError::with_detail(code, err.to_string())
    }
}

pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Connection parameters for one embedding model.
#[derive(Clone, PartialEq, Eq)]
pub struct EmbedderSpec {
    pub model_type: String,
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for EmbedderSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedderSpec")
            .field("model_type", &self.model_type)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl EmbedderSpec {
    pub fn is_local(&self) -> bool {
        is_local_model(&self.model_type)
    }
}

pub fn is_local_model(model_type: &str) -> bool {
    model_type.trim() == LOCAL_HASH_MODEL
}

pub trait EmbedderFactory: Send + Sync {
    fn build(&self, spec: &EmbedderSpec) -> Box<dyn Embedder>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEmbedderFactory;

impl EmbedderFactory for DefaultEmbedderFactory {
    fn build(&self, spec: &EmbedderSpec) -> Box<dyn Embedder> {
        build_embedder(spec)
    }
}

pub fn build_embedder(spec: &EmbedderSpec) -> Box<dyn Embedder> {
    if spec.is_local() {
        return Box::new(HashingEmbedder);
    }
    Box::new(OpenAiCompatibleEmbedder::new(
        &spec.base_url,
        &spec.api_key,
        &spec.model_type,
        spec.timeout,
    ))
}

/// Sends one short text through the model to confirm it is reachable with
/// the given credentials.
pub fn probe_embedder(embedder: &dyn Embedder) -> Result<usize, EmbeddingError> {
    let vector = embedder.embed(PROBE_TEXT)?;
    Ok(vector.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(model: &str) -> EmbedderSpec {
        EmbedderSpec {
            model_type: model.to_string(),
            base_url: "https://example.invalid/v1".to_string(),
            api_key: "sk-secret".to_string(),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn local_model_needs_no_network() {
        let embedder = build_embedder(&spec(LOCAL_HASH_MODEL));
        assert_eq!(embedder.model_name(), LOCAL_HASH_MODEL);
        assert_eq!(probe_embedder(embedder.as_ref()).expect("probe"), HASH_EMBEDDING_DIM);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let rendered = format!("{:?}", spec("text-embedding-v1"));
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn rejected_key_maps_to_invalid_api_key_code() {
        let err: ServiceError = EmbeddingError::InvalidApiKey("status 401: nope".to_string()).into();
        assert_eq!(err.code, ErrorCode::InvalidApiKey);
        for other in [
            EmbeddingError::Transport("refused".to_string()),
            EmbeddingError::Decode("expected value".to_string()),
            EmbeddingError::EmptyResponse,
        ] {
            let err: ServiceError = other.into();
            assert_eq!(err.code, ErrorCode::ApiError);
        }
    }
}
