//! Embedding provider abstraction and backend implementations.
//!
//! Turns batches of text into fixed-length vectors. The indexing and
//! search pipeline only sees the [`EmbeddingProvider`] trait; concrete
//! backends (OpenAI-compatible HTTP, test mock) live behind it.

pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;

pub use error::{EmbedError, Result};
#[cfg(feature = "mock")]
pub use mock::MockEmbedder;
pub use openai::OpenAiEmbedder;
pub use provider::EmbeddingProvider;
