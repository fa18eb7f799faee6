//! OpenAI-compatible `/embeddings` backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EmbedError;
use crate::provider::{BoxFuture, EmbeddingProvider};

/// Upstream batch limit per request.
const API_BATCH_SIZE: usize = 100;

/// Pause between consecutive batch requests to stay under rate limits.
const INTER_BATCH_DELAY_MS: u64 = 100;

/// Known models and their output dimensions.
const MODEL_DIMENSIONS: &[(&str, usize)] = &[
    ("text-embedding-3-small", 1536),
    ("text-embedding-3-large", 3072),
    ("text-embedding-ada-002", 1536),
];

/// Embedding provider backed by an OpenAI-compatible HTTP endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Create an embedder for a known model.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::UnknownModel`] if the model has no entry in
    /// the dimension table.
    pub fn new(api_key: String, mut base_url: String, model: String) -> Result<Self, EmbedError> {
        let dimension = model_dimension(&model).ok_or_else(|| EmbedError::UnknownModel(model.clone()))?;
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            model,
            dimension,
        })
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn request_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = EmbeddingRequest {
            input: batch,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(EmbedError::Http)?;

        if !status.is_success() {
            tracing::error!("embedding API error {status}: {text}");
            return Err(EmbedError::Unavailable(format!(
                "embedding request failed (status {status})"
            )));
        }

        let resp: EmbeddingResponse = serde_json::from_str(&text)?;
        Ok(resp.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, EmbedError>> {
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let mut vectors = Vec::with_capacity(texts.len());
            let batches: Vec<_> = texts.chunks(API_BATCH_SIZE).collect();
            let last = batches.len().saturating_sub(1);

            for (i, batch) in batches.into_iter().enumerate() {
                let batch_vectors = self.request_batch(batch).await?;
                if batch_vectors.len() != batch.len() {
                    return Err(EmbedError::CountMismatch {
                        requested: batch.len(),
                        received: batch_vectors.len(),
                    });
                }
                vectors.extend(batch_vectors);

                if i < last {
                    tokio::time::sleep(Duration::from_millis(INTER_BATCH_DELAY_MS)).await;
                }
            }

            Ok(vectors)
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

fn model_dimension(model: &str) -> Option<usize> {
    MODEL_DIMENSIONS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, dim)| *dim)
}
