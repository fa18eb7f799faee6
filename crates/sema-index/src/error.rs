//! Error types for sema-index.

use std::path::PathBuf;

/// Errors surfaced by the indexing and search pipeline.
///
/// Per-file and per-batch failures are absorbed inside the orchestrator
/// and never reach callers; these variants are either fatal to a whole
/// operation (missing path, unembeddable query) or internal signals the
/// chunker recovers from (`Parse`, `UnsupportedLanguage`).
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Indexing target does not exist.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tree-sitter parsing error; recovered via line chunking.
    #[error("parse failed: {0}")]
    Parse(String),

    /// No grammar available; recovered via line chunking.
    #[error("unsupported language")]
    UnsupportedLanguage,

    /// Embedding provider error. Fatal for search queries, absorbed
    /// per-batch during indexing.
    #[error("embedding failed: {0}")]
    Embedding(#[from] sema_embed::EmbedError),

    /// Vector store error.
    #[error("vector store error: {0}")]
    Store(#[from] sema_store::StoreError),
}

/// Result type alias using [`IndexError`].
pub type Result<T> = std::result::Result<T, IndexError>;
