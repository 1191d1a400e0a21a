//! OpenAI-compatible embeddings client.

use std::time::Duration;

use ragq_core::RetrievalError;
use ragq_core::config::EmbeddingConfig;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::Embedder;
use super::http::{HttpError, agent, normalize_base_url};

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// `POST {base_url}/embeddings` with bearer auth.
pub struct OpenAiEmbedder {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbedder {
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] when `base_url` is not an http(s) URL.
    pub fn new(
        config: &EmbeddingConfig,
        api_key: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, RetrievalError> {
        let base = normalize_base_url(&config.base_url)
            .map_err(|e| RetrievalError::Config(format!("embedding.base_url: {e}")))?;
        Ok(Self {
            agent: agent(connect_timeout),
            endpoint: format!("{base}/embeddings"),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, text: &str, timeout: Duration) -> Result<Vec<f32>, HttpError> {
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .timeout(timeout)
            .send_json(json!({
                "model": self.model,
                "input": text,
            }))
            .map_err(|e| HttpError::from_ureq(&self.endpoint, e))?;

        let body: EmbeddingResponse = response
            .into_json()
            .map_err(|e| HttpError::decode(&self.endpoint, e))?;

        parse_embedding(body).ok_or_else(|| HttpError::decode(&self.endpoint, "response carried no embedding"))
    }
}

fn parse_embedding(body: EmbeddingResponse) -> Option<Vec<f32>> {
    body.data
        .into_iter()
        .next()
        .map(|datum| datum.embedding)
        .filter(|embedding| !embedding.is_empty())
}

impl Embedder for OpenAiEmbedder {
    #[instrument(skip_all, fields(model = %self.model, chars = text.len()))]
    fn embed(&self, text: &str, timeout: Duration) -> Result<Vec<f32>, RetrievalError> {
        let embedding = self.request(text, timeout).map_err(RetrievalError::embedding)?;
        debug!(dims = embedding.len(), "query embedded");
        Ok(embedding)
    }
}
