//! Codebase indexing pipeline: discover, chunk, embed, upsert.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sema_embed::EmbeddingProvider;
use sema_store::{VectorPoint, VectorStore};
use serde_json::{Value, json};

use crate::chunker::{ChunkerConfig, CodeChunk, chunk_file};
use crate::discovery::{DEFAULT_EXCLUDE_PATTERNS, DEFAULT_INCLUDE_PATTERNS, discover_files};
use crate::error::{IndexError, Result};

/// Character budget for the text sent to the embedding provider.
const MAX_EMBED_CHARS: usize = 8000;

/// Configuration for [`CodeIndexer`].
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Prefix for derived collection names (default: `sema`).
    pub collection_prefix: String,
    /// Files per processing batch (default: 100).
    pub batch_size: usize,
    pub chunker: ChunkerConfig,
    /// Include globs; empty means the built-in defaults.
    pub include_patterns: Vec<String>,
    /// Extra exclude globs, always combined with the built-in defaults.
    pub exclude_patterns: Vec<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            collection_prefix: "sema".to_string(),
            batch_size: 100,
            chunker: ChunkerConfig::default(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

/// Summary of one indexing run.
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub collection: String,
    pub files_processed: usize,
    pub chunks_indexed: usize,
    pub elapsed: Duration,
}

/// Indexes a codebase into a vector store collection.
pub struct CodeIndexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: IndexerConfig,
}

impl CodeIndexer {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            config: IndexerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: IndexerConfig) -> Self {
        self.config = config;
        self
    }

    /// Collection name for a codebase path: `{prefix}-{name}` when a
    /// custom name is given, else `{prefix}-{hash12}` of the canonical
    /// path so the same codebase always maps to the same collection.
    #[must_use]
    pub fn collection_name(&self, path: &Path, custom_name: Option<&str>) -> String {
        if let Some(name) = custom_name {
            return format!("{}-{name}", self.config.collection_prefix);
        }
        let canonical = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        let digest = blake3::hash(canonical.to_string_lossy().as_bytes()).to_hex();
        format!("{}-{}", self.config.collection_prefix, &digest.as_str()[..12])
    }

    /// Index every matching file under `path`.
    ///
    /// `include_patterns`/`exclude_patterns` override the configured
    /// patterns for this run only; `None` falls back to the config and
    /// then the built-in defaults. Per-file read and chunk failures are
    /// logged and skipped; a batch whose embedding or upsert fails is
    /// dropped whole while later batches continue. Only missing paths
    /// and collection setup abort the run.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::PathNotFound`] when `path` does not exist
    /// and [`IndexError::Store`] when the collection cannot be created.
    pub async fn index_codebase(
        &self,
        path: &Path,
        custom_name: Option<&str>,
        include_patterns: Option<&[String]>,
        exclude_patterns: Option<&[String]>,
    ) -> Result<IndexReport> {
        let start = Instant::now();
        if !path.exists() {
            return Err(IndexError::PathNotFound(path.to_path_buf()));
        }
        let root = path.canonicalize()?;
        let collection = self.collection_name(&root, custom_name);

        let dimension = u64::try_from(self.embedder.dimension()).unwrap_or(u64::MAX);
        self.store.ensure_collection(&collection, dimension).await?;

        let configured = include_patterns.unwrap_or(&self.config.include_patterns);
        let includes: Vec<String> = if configured.is_empty() {
            DEFAULT_INCLUDE_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect()
        } else {
            configured.to_vec()
        };
        let mut excludes: Vec<String> =
            exclude_patterns.unwrap_or(&self.config.exclude_patterns).to_vec();
        excludes.extend(DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| (*s).to_string()));

        let files = discover_files(&root, &includes, &excludes);
        tracing::info!(collection = %collection, files = files.len(), "starting index run");

        let mut files_processed = 0;
        let mut chunks_indexed = 0;

        for batch in files.chunks(self.config.batch_size.max(1)) {
            let chunks = self.chunk_batch(batch, &root).await;
            files_processed += batch.len();

            if chunks.is_empty() {
                continue;
            }
            match self.index_chunks(&collection, chunks).await {
                Ok(indexed) => chunks_indexed += indexed,
                Err(e) => {
                    tracing::error!(error = %e, "dropping batch after indexing failure");
                }
            }
            tracing::info!(
                processed = files_processed,
                total = files.len(),
                chunks = chunks_indexed,
                "index progress"
            );
        }

        let report = IndexReport {
            collection,
            files_processed,
            chunks_indexed,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            collection = %report.collection,
            files = report.files_processed,
            chunks = report.chunks_indexed,
            elapsed_ms = report.elapsed.as_millis(),
            "index run complete"
        );
        Ok(report)
    }

    /// Re-index a codebase. Currently a full re-run over the same
    /// collection; new points are appended, stale points are not
    /// removed.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::index_codebase`].
    pub async fn update_index(
        &self,
        path: &Path,
        custom_name: Option<&str>,
        include_patterns: Option<&[String]>,
        exclude_patterns: Option<&[String]>,
    ) -> Result<IndexReport> {
        self.index_codebase(path, custom_name, include_patterns, exclude_patterns)
            .await
    }

    /// Drop an index collection. Returns `false` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Store`] on store failures.
    pub async fn delete_index(&self, collection: &str) -> Result<bool> {
        Ok(self.store.delete_collection(collection).await?)
    }

    async fn chunk_batch(&self, files: &[std::path::PathBuf], root: &Path) -> Vec<CodeChunk> {
        let mut all_chunks = Vec::new();
        for file in files {
            let bytes = match tokio::fs::read(file).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            // best-effort decode: invalid UTF-8 is replaced, never fatal
            let content = String::from_utf8_lossy(&bytes);
            if content.trim().is_empty() {
                continue;
            }
            let rel = file
                .strip_prefix(root)
                .unwrap_or(file)
                .to_string_lossy()
                .replace('\\', "/");
            let chunks = chunk_file(&rel, &content, &self.config.chunker);
            tracing::debug!(file = %rel, chunks = chunks.len(), "chunked file");
            all_chunks.extend(chunks);
        }
        all_chunks
    }

    async fn index_chunks(&self, collection: &str, mut chunks: Vec<CodeChunk>) -> Result<usize> {
        for chunk in &mut chunks {
            chunk.context = Some(context_string(chunk));
        }
        let texts: Vec<String> = chunks.iter().map(embedding_text).collect();

        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(IndexError::Embedding(
                sema_embed::EmbedError::CountMismatch {
                    requested: chunks.len(),
                    received: embeddings.len(),
                },
            ));
        }

        let indexed_at = chrono::Utc::now().timestamp();
        let points: Vec<VectorPoint> = chunks
            .iter()
            .zip(embeddings)
            .filter(|(_, vector)| !vector.is_empty())
            .map(|(chunk, vector)| VectorPoint {
                id: uuid::Uuid::new_v4().to_string(),
                vector,
                payload: chunk_payload(chunk, indexed_at),
            })
            .collect();

        if points.is_empty() {
            return Ok(0);
        }
        let count = points.len();
        self.store.upsert(collection, points).await?;
        tracing::debug!(collection = %collection, points = count, "upserted chunk batch");
        Ok(count)
    }
}

/// Human-readable summary stored alongside each chunk and prepended to
/// the embedding text.
fn context_string(chunk: &CodeChunk) -> String {
    let mut parts = vec![format!("File: {}", chunk.file_path)];
    if let Some(class_name) = &chunk.class_name {
        parts.push(format!("Class: {class_name}"));
    }
    if let Some(function_name) = &chunk.function_name {
        parts.push(format!("Function: {function_name}"));
    }
    parts.push(format!("Type: {}", chunk.chunk_type()));
    if !chunk.imports.is_empty() {
        let mut imports: String = chunk
            .imports
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if chunk.imports.len() > 3 {
            imports.push_str("...");
        }
        parts.push(format!("Imports: {imports}"));
    }
    parts.join(" | ")
}

/// Compose the provider input, keeping code over context when the
/// combined text exceeds the character budget.
fn embedding_text(chunk: &CodeChunk) -> String {
    let context = chunk.context.as_deref().unwrap_or_default();
    let full = format!(
        "Language: {}\nContext: {}\n{}",
        chunk.language, context, chunk.content
    );
    if full.len() <= MAX_EMBED_CHARS {
        return full;
    }

    if chunk.content.len() < MAX_EMBED_CHARS {
        let budget = MAX_EMBED_CHARS.saturating_sub(chunk.content.len() + 100);
        let trimmed = truncate_to_boundary(context, budget);
        if trimmed.is_empty() {
            format!("Language: {}\n{}", chunk.language, chunk.content)
        } else {
            format!(
                "Language: {}\nContext: {trimmed}...\n{}",
                chunk.language, chunk.content
            )
        }
    } else {
        let code = truncate_to_boundary(&chunk.content, MAX_EMBED_CHARS - 100);
        format!("Language: {}\n{code}...", chunk.language)
    }
}

fn truncate_to_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn chunk_payload(chunk: &CodeChunk, indexed_at: i64) -> HashMap<String, Value> {
    let mut payload = HashMap::new();
    payload.insert("filePath".to_string(), json!(chunk.file_path));
    payload.insert("codeChunk".to_string(), json!(chunk.content));
    payload.insert("startLine".to_string(), json!(chunk.start_line));
    payload.insert("endLine".to_string(), json!(chunk.end_line));
    payload.insert("language".to_string(), json!(chunk.language));
    payload.insert("chunkType".to_string(), json!(chunk.chunk_type()));
    payload.insert("functionName".to_string(), json!(chunk.function_name));
    payload.insert("className".to_string(), json!(chunk.class_name));
    payload.insert("imports".to_string(), json!(chunk.imports));
    payload.insert("context".to_string(), json!(chunk.context));
    payload.insert(
        "pathSegments".to_string(),
        json!(path_segments(&chunk.file_path)),
    );
    payload.insert("fileHash".to_string(), json!(chunk.content_hash));
    payload.insert("indexedAt".to_string(), json!(indexed_at));
    payload
}

/// Positional path components keyed by index, for directory filtering.
fn path_segments(file_path: &str) -> HashMap<String, String> {
    file_path
        .split('/')
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, part)| (i.to_string(), part.to_string()))
        .collect()
}
