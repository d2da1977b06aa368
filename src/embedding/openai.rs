use super::{Embedder, EmbeddingError};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Client for `POST {base_url}/embeddings` on OpenAI-compatible providers
/// (Volcengine Ark, DashScope compatible mode, OpenAI).
pub struct OpenAiCompatibleEmbedder {
    base_url: String,
    api_key: String,
    model: String,
    agent: ureq::Agent,
}

impl std::fmt::Debug for OpenAiCompatibleEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAiCompatibleEmbedder {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            model: model.trim().to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }
}

impl Embedder for OpenAiCompatibleEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .agent
            .post(&self.endpoint())
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(json!({
                "model": self.model,
                "input": [text],
                "encoding_format": "float",
            }))
            .map_err(map_ureq_error)?;

        let body: EmbeddingsResponse = response
            .into_json()
            .map_err(|err| EmbeddingError::Decode(err.to_string()))?;
        let mut data = body.data;
        data.sort_by_key(|datum| datum.index);
        let vector = data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .ok_or(EmbeddingError::EmptyResponse)?;
        if vector.is_empty() {
            return Err(EmbeddingError::EmptyResponse);
        }
        Ok(vector)
    }
}

fn map_ureq_error(err: ureq::Error) -> EmbeddingError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response
                .into_string()
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect::<String>();
            if matches!(status, 401 | 403) {
                EmbeddingError::InvalidApiKey(format!("status {status}: {body}"))
            } else {
                EmbeddingError::Api(format!("status {status}: {body}"))
            }
        }
        ureq::Error::Transport(transport) => EmbeddingError::Transport(transport.to_string()),
    }
}
