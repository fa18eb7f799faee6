//! Test-only mock embedding provider.

use crate::error::EmbedError;
use crate::provider::{BoxFuture, EmbeddingProvider};

/// Deterministic embedder for tests.
///
/// Texts containing a registered marker substring get that marker's
/// vector; everything else gets a stable pseudo-vector derived from the
/// text bytes, so distinct texts rank differently under cosine search.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimension: usize,
    pub fail: bool,
    overrides: Vec<(String, Vec<f32>)>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dimension: 8,
            fail: false,
            overrides: Vec::new(),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Register a fixed vector for any text containing `marker`.
    #[must_use]
    pub fn with_override(mut self, marker: impl Into<String>, vector: Vec<f32>) -> Self {
        self.overrides.push((marker.into(), vector));
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        for (marker, vector) in &self.overrides {
            if text.contains(marker.as_str()) {
                return vector.clone();
            }
        }

        let mut v = vec![0.0f32; self.dimension];
        for (i, b) in text.bytes().enumerate() {
            v[i % self.dimension] += f32::from(b) / 255.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl EmbeddingProvider for MockEmbedder {
    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, EmbedError>> {
        Box::pin(async move {
            if self.fail {
                return Err(EmbedError::Other("mock embedding error".into()));
            }
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
