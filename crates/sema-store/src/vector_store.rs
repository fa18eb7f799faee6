use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::StoreError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One stored record: opaque id, vector, flat JSON payload.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// A search hit with its similarity score and payload.
#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Conjunctive payload filter: every condition must match.
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    pub must: Vec<FieldCondition>,
}

impl VectorFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FieldCondition {
    pub field: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
}

/// One row of [`VectorStore::list_collections`].
#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub name: String,
    pub points_count: u64,
    pub status: String,
}

/// Detailed collection metadata.
#[derive(Debug, Clone)]
pub struct CollectionDetail {
    pub name: String,
    pub points_count: u64,
    pub status: String,
    pub vector_size: u64,
    pub distance: String,
}

/// A named, independently addressable vector index.
///
/// Implementations are expected to be safe for concurrent use; the
/// pipeline shares one instance across indexing and search calls.
pub trait VectorStore: Send + Sync {
    /// Create the collection with cosine distance if missing. Idempotent.
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Ranked nearest-neighbor search with optional score threshold and
    /// payload filter.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        score_threshold: Option<f32>,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, StoreError>>;

    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<CollectionSummary>, StoreError>>;

    /// Fails with [`StoreError::CollectionNotFound`] for unknown names.
    fn collection_info(&self, collection: &str)
    -> BoxFuture<'_, Result<CollectionDetail, StoreError>>;

    /// Returns `true` if a collection was actually removed.
    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<bool, StoreError>>;
}
