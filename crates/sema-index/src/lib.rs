//! AST-based code chunking, indexing, and semantic search.
//!
//! The pipeline: tree-sitter splits source files into semantically
//! bounded chunks (with line-based fallback for anything unparseable),
//! chunks are embedded in batches and upserted into a vector store
//! collection per indexed tree, and queries come back as ranked,
//! filterable search hits.

pub mod chunker;
pub mod discovery;
pub mod error;
pub mod indexer;
pub mod languages;
pub mod searcher;

pub use chunker::{ChunkKind, ChunkerConfig, CodeChunk, chunk_file};
pub use error::{IndexError, Result};
pub use languages::{Lang, detect_language};
pub use indexer::{CodeIndexer, IndexReport, IndexerConfig};
pub use searcher::{CodeSearcher, SearchConfig, SearchFilters, SearchHit};
