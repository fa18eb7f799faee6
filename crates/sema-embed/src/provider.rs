use std::future::Future;
use std::pin::Pin;

use crate::error::EmbedError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Batch embedding capability.
///
/// Implementations must return exactly one vector per input text, in
/// input order, with every vector of length [`dimension`](Self::dimension).
/// Providers with upstream batch limits are expected to split internally.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing service is unreachable or the
    /// response cannot be decoded.
    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>, EmbedError>>;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::EmptyResponse`] if the provider produced
    /// no vector for the input.
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbedError>> {
        Box::pin(async move {
            let texts = vec![text.to_owned()];
            let mut vectors = self.embed_batch(&texts).await?;
            if vectors.is_empty() {
                return Err(EmbedError::EmptyResponse {
                    provider: self.name(),
                });
            }
            Ok(vectors.swap_remove(0))
        })
    }

    /// Fixed output dimension of this provider's vectors.
    fn dimension(&self) -> usize;

    fn name(&self) -> &'static str;
}
