//! Semantic search over indexed collections with result enrichment.

use std::collections::HashMap;
use std::sync::Arc;

use sema_embed::EmbeddingProvider;
use sema_store::{FieldCondition, FieldValue, ScoredVectorPoint, VectorFilter, VectorStore};
use serde_json::Value;

use crate::error::Result;

/// Preview length cap in characters.
const PREVIEW_MAX_CHARS: usize = 200;

/// Vocabulary backing [`CodeSearcher::search_suggestions`].
const COMMON_SEARCH_TERMS: &[&str] = &[
    "function definition",
    "class declaration",
    "method implementation",
    "error handling",
    "data validation",
    "API endpoint",
    "database query",
    "authentication",
    "authorization",
    "configuration",
    "utility function",
    "test case",
    "mock object",
    "dependency injection",
    "design pattern",
    "algorithm implementation",
    "data structure",
    "recursion",
    "iteration",
];

/// Configuration for [`CodeSearcher`].
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Prefix selecting which collections a fan-out search visits.
    pub collection_prefix: String,
    /// Result cap per search (default: 10).
    pub limit: u64,
    /// Minimum similarity score (default: 0.7).
    pub similarity_threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            collection_prefix: "sema".to_string(),
            limit: 10,
            similarity_threshold: 0.7,
        }
    }
}

/// Optional payload constraints, combined conjunctively.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// File path filter; `*` wildcards are stripped before matching.
    pub file_pattern: Option<String>,
    pub language: Option<String>,
    pub chunk_type: Option<String>,
    pub function_name: Option<String>,
    pub class_name: Option<String>,
}

impl SearchFilters {
    /// Translate to a store-level filter. Returns `None` when no
    /// condition survives, so unfiltered searches skip filter overhead.
    #[must_use]
    pub fn to_vector_filter(&self) -> Option<VectorFilter> {
        let mut must = Vec::new();

        if let Some(pattern) = &self.file_pattern {
            let stripped = pattern.replace('*', "");
            if !stripped.is_empty() {
                must.push(text_condition("filePath", &stripped));
            }
        }
        if let Some(language) = &self.language {
            must.push(text_condition("language", language));
        }
        if let Some(chunk_type) = &self.chunk_type {
            must.push(text_condition("chunkType", chunk_type));
        }
        if let Some(function_name) = &self.function_name {
            must.push(text_condition("functionName", function_name));
        }
        if let Some(class_name) = &self.class_name {
            must.push(text_condition("className", class_name));
        }

        if must.is_empty() {
            None
        } else {
            Some(VectorFilter { must })
        }
    }
}

fn text_condition(field: &str, value: &str) -> FieldCondition {
    FieldCondition {
        field: field.to_string(),
        value: FieldValue::Text(value.to_string()),
    }
}

/// One enriched search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    /// Collection the hit came from.
    pub collection: String,
    pub score: f32,
    /// Score scaled to 0..=100 for display.
    pub score_percentage: u8,
    pub file_path: String,
    pub file_extension: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: String,
    pub chunk_type: String,
    pub function_name: Option<String>,
    pub class_name: Option<String>,
    pub context: Option<String>,
    pub code: String,
    /// Code with right-aligned line numbers, `{n:>4} | line`.
    pub formatted_code: String,
    /// Short preview, broken at a line boundary when one lands late
    /// enough in the budget.
    pub preview: String,
}

/// Searches indexed code by semantic similarity.
pub struct CodeSearcher {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: SearchConfig,
}

impl CodeSearcher {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            config: SearchConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Natural-language search. With a collection name the search stays
    /// local; without one it fans out over every collection carrying
    /// the configured prefix. `limit` and `similarity_threshold` apply
    /// to this call only; `None` falls back to the config.
    ///
    /// # Errors
    ///
    /// Fails when the query cannot be embedded or, for a named
    /// collection, when that collection's search fails. During fan-out,
    /// per-collection failures are logged and skipped.
    pub async fn search(
        &self,
        query: &str,
        collection: Option<&str>,
        filters: &SearchFilters,
        limit: Option<u64>,
        similarity_threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>> {
        let vector = self.embedder.embed(query).await?;
        self.search_vector(
            vector,
            collection,
            filters.to_vector_filter(),
            limit.unwrap_or(self.config.limit),
            similarity_threshold.unwrap_or(self.config.similarity_threshold),
        )
        .await
    }

    /// Search restricted to `function` chunks.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::search`].
    pub async fn search_functions(
        &self,
        query: &str,
        collection: Option<&str>,
        language: Option<&str>,
        limit: Option<u64>,
    ) -> Result<Vec<SearchHit>> {
        let filters = SearchFilters {
            chunk_type: Some("function".to_string()),
            language: language.map(str::to_string),
            ..SearchFilters::default()
        };
        self.search(query, collection, &filters, limit, None).await
    }

    /// Search restricted to `class` chunks.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::search`].
    pub async fn search_classes(
        &self,
        query: &str,
        collection: Option<&str>,
        language: Option<&str>,
        limit: Option<u64>,
    ) -> Result<Vec<SearchHit>> {
        let filters = SearchFilters {
            chunk_type: Some("class".to_string()),
            language: language.map(str::to_string),
            ..SearchFilters::default()
        };
        self.search(query, collection, &filters, limit, None).await
    }

    /// Find code similar to a snippet. The snippet is embedded the same
    /// way indexed chunks are, and the threshold is raised to 0.8 since
    /// code-to-code similarity runs higher than text-to-code.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::search`].
    pub async fn search_by_code_similarity(
        &self,
        code_snippet: &str,
        language: Option<&str>,
        collection: Option<&str>,
        limit: Option<u64>,
    ) -> Result<Vec<SearchHit>> {
        let text = format!(
            "Language: {}\n{code_snippet}",
            language.unwrap_or("unknown")
        );
        let vector = self.embedder.embed(&text).await?;

        let filter = language.map(|lang| VectorFilter {
            must: vec![text_condition("language", lang)],
        });
        self.search_vector(vector, collection, filter, limit.unwrap_or(self.config.limit), 0.8)
            .await
    }

    /// Find code related to a file (and optionally a function) by
    /// searching for its identifiers at a relaxed 0.5 threshold.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::search`].
    pub async fn find_related_code(
        &self,
        file_path: &str,
        function_name: Option<&str>,
        collection: Option<&str>,
        limit: Option<u64>,
    ) -> Result<Vec<SearchHit>> {
        let mut query = format!("file {file_path}");
        if let Some(name) = function_name {
            query.push_str(&format!(" function {name}"));
        }
        let vector = self.embedder.embed(&query).await?;
        self.search_vector(vector, collection, None, limit.unwrap_or(5), 0.5)
            .await
    }

    /// Suggest completions for a partial query from a fixed vocabulary
    /// of common code-search phrases, matched case-insensitively by
    /// substring.
    #[must_use]
    pub fn search_suggestions(&self, partial_query: &str, limit: usize) -> Vec<String> {
        let partial = partial_query.to_lowercase();
        COMMON_SEARCH_TERMS
            .iter()
            .filter(|term| term.to_lowercase().contains(&partial))
            .take(limit)
            .map(|term| (*term).to_string())
            .collect()
    }

    async fn search_vector(
        &self,
        vector: Vec<f32>,
        collection: Option<&str>,
        filter: Option<VectorFilter>,
        limit: u64,
        threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        if let Some(name) = collection {
            let points = self
                .store
                .search(name, vector, limit, Some(threshold), filter)
                .await?;
            return Ok(points.into_iter().map(|p| enrich(p, name)).collect());
        }
        self.fan_out(vector, filter, limit, threshold).await
    }

    /// Query every prefixed collection, then merge, sort, and truncate.
    /// Each collection contributes up to `limit` candidates before the
    /// global cut, so deep per-collection tails can be shadowed.
    async fn fan_out(
        &self,
        vector: Vec<f32>,
        filter: Option<VectorFilter>,
        limit: u64,
        threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        let prefix = format!("{}-", self.config.collection_prefix);
        let collections = self.store.list_collections().await?;

        let mut hits = Vec::new();
        for summary in collections {
            if !summary.name.starts_with(&prefix) {
                continue;
            }
            match self
                .store
                .search(
                    &summary.name,
                    vector.clone(),
                    limit,
                    Some(threshold),
                    filter.clone(),
                )
                .await
            {
                Ok(points) => {
                    hits.extend(points.into_iter().map(|p| enrich(p, &summary.name)));
                }
                Err(e) => {
                    tracing::warn!(
                        collection = %summary.name,
                        error = %e,
                        "skipping collection during fan-out search"
                    );
                }
            }
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(hits)
    }
}

fn enrich(point: ScoredVectorPoint, collection: &str) -> SearchHit {
    let payload = &point.payload;
    let file_path = payload_str(payload, "filePath");
    let code = payload_str(payload, "codeChunk");
    let start_line = payload_usize(payload, "startLine").max(1);

    SearchHit {
        file_extension: file_extension(&file_path),
        formatted_code: format_code(&code, start_line),
        preview: preview(&code),
        score_percentage: score_percentage(point.score),
        collection: collection.to_string(),
        score: point.score,
        end_line: payload_usize(payload, "endLine"),
        language: payload_str(payload, "language"),
        chunk_type: payload_str(payload, "chunkType"),
        function_name: payload_opt_str(payload, "functionName"),
        class_name: payload_opt_str(payload, "className"),
        context: payload_opt_str(payload, "context"),
        id: point.id,
        file_path,
        start_line,
        code,
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn payload_opt_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn payload_usize(payload: &HashMap<String, Value>, key: &str) -> usize {
    payload
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(0)
}

fn file_extension(file_path: &str) -> String {
    match file_path.rsplit_once('.') {
        Some((_, ext)) => ext.to_string(),
        None => String::new(),
    }
}

fn format_code(code: &str, start_line: usize) -> String {
    code.split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:>4} | {line}", start_line + i))
        .collect::<Vec<_>>()
        .join("\n")
}

fn score_percentage(score: f32) -> u8 {
    let scaled = (f64::from(score) * 100.0) as i64;
    scaled.clamp(0, 100) as u8
}

fn preview(code: &str) -> String {
    if code.len() <= PREVIEW_MAX_CHARS {
        return code.to_string();
    }
    let mut end = PREVIEW_MAX_CHARS;
    while end > 0 && !code.is_char_boundary(end) {
        end -= 1;
    }
    let mut cut = &code[..end];

    // break at a newline when one lands in the last 30% of the budget
    if let Some(last_newline) = cut.rfind('\n')
        && last_newline * 10 > PREVIEW_MAX_CHARS * 7
    {
        cut = &cut[..last_newline];
    }
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sema_embed::MockEmbedder;
    use sema_store::{InMemoryStore, VectorPoint};
    use serde_json::json;

    fn payload(file: &str, code: &str, chunk_type: &str) -> HashMap<String, Value> {
        let mut p = HashMap::new();
        p.insert("filePath".to_string(), json!(file));
        p.insert("codeChunk".to_string(), json!(code));
        p.insert("startLine".to_string(), json!(10));
        p.insert("endLine".to_string(), json!(12));
        p.insert("language".to_string(), json!("python"));
        p.insert("chunkType".to_string(), json!(chunk_type));
        p.insert("functionName".to_string(), json!("handler"));
        p.insert("className".to_string(), Value::Null);
        p
    }

    async fn seed(store: &InMemoryStore, collection: &str, id: &str, vector: Vec<f32>) {
        use sema_store::VectorStore;
        store.ensure_collection(collection, 4).await.unwrap();
        store
            .upsert(
                collection,
                vec![VectorPoint {
                    id: id.to_string(),
                    vector,
                    payload: payload("src/api.py", "def handler():\n    return 200", "function"),
                }],
            )
            .await
            .unwrap();
    }

    fn permissive_config() -> SearchConfig {
        SearchConfig {
            similarity_threshold: 0.0,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn filters_translate_to_conditions() {
        let filters = SearchFilters {
            file_pattern: Some("*src/api.py*".to_string()),
            language: Some("python".to_string()),
            chunk_type: Some("function".to_string()),
            ..SearchFilters::default()
        };
        let filter = filters.to_vector_filter().expect("filter");
        assert_eq!(filter.must.len(), 3);
        assert_eq!(filter.must[0].field, "filePath");
        match &filter.must[0].value {
            FieldValue::Text(s) => assert_eq!(s, "src/api.py"),
            FieldValue::Integer(_) => panic!("expected text condition"),
        }
    }

    #[test]
    fn wildcard_only_pattern_dropped() {
        let filters = SearchFilters {
            file_pattern: Some("***".to_string()),
            ..SearchFilters::default()
        };
        assert!(filters.to_vector_filter().is_none());
    }

    #[test]
    fn no_filters_means_no_vector_filter() {
        assert!(SearchFilters::default().to_vector_filter().is_none());
    }

    #[test]
    fn code_formatted_with_line_numbers() {
        let formatted = format_code("a\nb", 9);
        assert_eq!(formatted, "   9 | a\n  10 | b");
    }

    #[test]
    fn score_percentage_clamped() {
        assert_eq!(score_percentage(0.734), 73);
        assert_eq!(score_percentage(1.4), 100);
        assert_eq!(score_percentage(-0.2), 0);
    }

    #[test]
    fn preview_short_code_untouched() {
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn preview_breaks_at_late_newline() {
        let mut code = "x".repeat(180);
        code.push('\n');
        code.push_str(&"y".repeat(100));
        let p = preview(&code);
        assert_eq!(p, format!("{}...", "x".repeat(180)));
    }

    #[test]
    fn preview_hard_cut_without_late_newline() {
        let code = "z".repeat(300);
        let p = preview(&code);
        assert_eq!(p.len(), PREVIEW_MAX_CHARS + 3);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn extension_extracted_from_path() {
        assert_eq!(file_extension("src/main.py"), "py");
        assert_eq!(file_extension("Makefile"), "");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
    }

    #[tokio::test]
    async fn named_collection_search_enriches_hits() {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(
            MockEmbedder::new(4).with_override("handler", vec![1.0, 0.0, 0.0, 0.0]),
        );
        seed(&store, "sema-app", "p1", vec![1.0, 0.0, 0.0, 0.0]).await;

        let searcher =
            CodeSearcher::new(store, embedder).with_config(permissive_config());
        let hits = searcher
            .search("handler", Some("sema-app"), &SearchFilters::default(), None, None)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.collection, "sema-app");
        assert_eq!(hit.file_extension, "py");
        assert_eq!(hit.score_percentage, 100);
        assert_eq!(hit.function_name.as_deref(), Some("handler"));
        assert!(hit.class_name.is_none());
        assert!(hit.formatted_code.starts_with("  10 | "));
    }

    #[tokio::test]
    async fn fan_out_merges_across_prefixed_collections() {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(
            MockEmbedder::new(4).with_override("query", vec![1.0, 0.0, 0.0, 0.0]),
        );
        seed(&store, "sema-one", "close", vec![1.0, 0.0, 0.0, 0.0]).await;
        seed(&store, "sema-two", "far", vec![0.0, 1.0, 0.0, 0.0]).await;
        seed(&store, "other-three", "hidden", vec![1.0, 0.0, 0.0, 0.0]).await;

        let searcher =
            CodeSearcher::new(store, embedder).with_config(permissive_config());
        let hits = searcher
            .search("query", None, &SearchFilters::default(), None, None)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2, "non-prefixed collection must be ignored");
        assert_eq!(hits[0].id, "close");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn chunk_type_filter_restricts_results() {
        use sema_store::VectorStore;
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(
            MockEmbedder::new(4).with_override("query", vec![1.0, 0.0, 0.0, 0.0]),
        );
        store.ensure_collection("sema-app", 4).await.unwrap();
        store
            .upsert(
                "sema-app",
                vec![
                    VectorPoint {
                        id: "f".to_string(),
                        vector: vec![1.0, 0.0, 0.0, 0.0],
                        payload: payload("a.py", "def f(): pass", "function"),
                    },
                    VectorPoint {
                        id: "c".to_string(),
                        vector: vec![1.0, 0.0, 0.0, 0.0],
                        payload: payload("a.py", "class C: pass", "class"),
                    },
                ],
            )
            .await
            .unwrap();

        let searcher =
            CodeSearcher::new(store, embedder).with_config(permissive_config());
        let hits = searcher
            .search_classes("query", Some("sema-app"), None, None)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "c");
        assert_eq!(hits[0].chunk_type, "class");
    }

    #[tokio::test]
    async fn related_code_uses_relaxed_threshold() {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(
            MockEmbedder::new(4).with_override("file src/api.py", vec![0.8, 0.6, 0.0, 0.0]),
        );
        seed(&store, "sema-app", "p1", vec![1.0, 0.0, 0.0, 0.0]).await;

        let searcher = CodeSearcher::new(store, embedder);
        let hits = searcher
            .find_related_code("src/api.py", None, Some("sema-app"), None)
            .await
            .unwrap();

        // cosine 0.8: passes the relaxed 0.5 bar but not the default 0.7+
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score_percentage, 80);
    }

    #[tokio::test]
    async fn per_call_limit_overrides_config() {
        use sema_store::VectorStore;
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(
            MockEmbedder::new(4).with_override("query", vec![1.0, 0.0, 0.0, 0.0]),
        );
        store.ensure_collection("sema-app", 4).await.unwrap();
        store
            .upsert(
                "sema-app",
                vec![
                    VectorPoint {
                        id: "near".to_string(),
                        vector: vec![1.0, 0.0, 0.0, 0.0],
                        payload: payload("a.py", "def a(): pass", "function"),
                    },
                    VectorPoint {
                        id: "far".to_string(),
                        vector: vec![0.6, 0.8, 0.0, 0.0],
                        payload: payload("b.py", "def b(): pass", "function"),
                    },
                ],
            )
            .await
            .unwrap();

        let searcher =
            CodeSearcher::new(store, embedder).with_config(permissive_config());
        let hits = searcher
            .search("query", Some("sema-app"), &SearchFilters::default(), Some(1), None)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "near");
    }

    #[tokio::test]
    async fn per_call_threshold_overrides_config() {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(
            MockEmbedder::new(4).with_override("query", vec![0.8, 0.6, 0.0, 0.0]),
        );
        seed(&store, "sema-app", "p1", vec![1.0, 0.0, 0.0, 0.0]).await;

        let searcher =
            CodeSearcher::new(store, embedder).with_config(permissive_config());

        let strict = searcher
            .search("query", Some("sema-app"), &SearchFilters::default(), None, Some(0.9))
            .await
            .unwrap();
        assert!(strict.is_empty(), "cosine 0.8 must miss a 0.9 bar");

        let relaxed = searcher
            .search("query", Some("sema-app"), &SearchFilters::default(), None, None)
            .await
            .unwrap();
        assert_eq!(relaxed.len(), 1);
    }

    #[test]
    fn suggestions_match_substring_case_insensitively() {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(MockEmbedder::new(4));
        let searcher = CodeSearcher::new(store, embedder);

        let auth = searcher.search_suggestions("AUTH", 5);
        assert_eq!(auth, vec!["authentication", "authorization"]);

        let data = searcher.search_suggestions("data", 5);
        assert_eq!(
            data,
            vec!["data validation", "database query", "data structure"]
        );
    }

    #[test]
    fn suggestions_capped_at_limit() {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(MockEmbedder::new(4));
        let searcher = CodeSearcher::new(store, embedder);

        assert_eq!(searcher.search_suggestions("a", 3).len(), 3);
        assert!(searcher.search_suggestions("no such term", 5).is_empty());
    }
}
