//! Process-local [`VectorStore`] used by tests and offline runs.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::vector_store::{
    BoxFuture, CollectionDetail, CollectionSummary, FieldValue, ScoredVectorPoint, VectorFilter,
    VectorPoint, VectorStore,
};

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

struct Collection {
    vector_size: u64,
    points: HashMap<String, StoredPoint>,
}

pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn matches_filter(payload: &HashMap<String, serde_json::Value>, filter: &VectorFilter) -> bool {
    filter.must.iter().all(|cond| {
        payload
            .get(&cond.field)
            .is_some_and(|val| field_matches(val, &cond.value))
    })
}

fn field_matches(val: &serde_json::Value, expected: &FieldValue) -> bool {
    match expected {
        FieldValue::Integer(i) => val.as_i64() == Some(*i),
        FieldValue::Text(s) => val.as_str() == Some(s.as_str()),
    }
}

impl VectorStore for InMemoryStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            cols.entry(collection).or_insert_with(|| Collection {
                vector_size,
                points: HashMap::new(),
            });
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| StoreError::Upsert(e.to_string()))?;
            let col = cols
                .get_mut(&collection)
                .ok_or_else(|| StoreError::CollectionNotFound(collection.clone()))?;
            for p in points {
                col.points.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                    },
                );
            }
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        score_threshold: Option<f32>,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| StoreError::Search(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or_else(|| StoreError::CollectionNotFound(collection.clone()))?;

            let mut hits: Vec<ScoredVectorPoint> = col
                .points
                .iter()
                .filter(|(_, p)| {
                    filter
                        .as_ref()
                        .is_none_or(|f| matches_filter(&p.payload, f))
                })
                .map(|(id, p)| ScoredVectorPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, &p.vector),
                    payload: p.payload.clone(),
                })
                .filter(|hit| score_threshold.is_none_or(|t| hit.score >= t))
                .collect();

            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
            hits.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(hits)
        })
    }

    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<CollectionSummary>, StoreError>> {
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            let mut summaries: Vec<CollectionSummary> = cols
                .iter()
                .map(|(name, col)| CollectionSummary {
                    name: name.clone(),
                    points_count: col.points.len() as u64,
                    status: "green".to_owned(),
                })
                .collect();
            summaries.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(summaries)
        })
    }

    fn collection_info(
        &self,
        collection: &str,
    ) -> BoxFuture<'_, Result<CollectionDetail, StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or_else(|| StoreError::CollectionNotFound(collection.clone()))?;
            Ok(CollectionDetail {
                points_count: col.points.len() as u64,
                status: "green".to_owned(),
                vector_size: col.vector_size,
                distance: "cosine".to_owned(),
                name: collection,
            })
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            Ok(cols.remove(&collection).is_some())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::FieldCondition;

    fn point(id: &str, vector: Vec<f32>, language: &str) -> VectorPoint {
        VectorPoint {
            id: id.to_owned(),
            vector,
            payload: serde_json::from_value(serde_json::json!({
                "language": language,
                "chunkType": "function",
            }))
            .unwrap(),
        }
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let store = InMemoryStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    point("near", vec![1.0, 0.0], "rust"),
                    point("far", vec![0.0, 1.0], "rust"),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .search("c", vec![1.0, 0.1], 10, None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "near");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn search_applies_threshold_and_limit() {
        let store = InMemoryStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    point("a", vec![1.0, 0.0], "rust"),
                    point("b", vec![0.9, 0.1], "rust"),
                    point("c", vec![0.0, 1.0], "rust"),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .search("c", vec![1.0, 0.0], 10, Some(0.5), None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);

        let hits = store
            .search("c", vec![1.0, 0.0], 1, None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn filter_must_is_conjunctive() {
        let store = InMemoryStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    point("py", vec![1.0, 0.0], "python"),
                    point("rs", vec![1.0, 0.0], "rust"),
                ],
            )
            .await
            .unwrap();

        let filter = VectorFilter {
            must: vec![
                FieldCondition {
                    field: "language".into(),
                    value: FieldValue::Text("python".into()),
                },
                FieldCondition {
                    field: "chunkType".into(),
                    value: FieldValue::Text("function".into()),
                },
            ],
        };
        let hits = store
            .search("c", vec![1.0, 0.0], 10, None, Some(filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "py");
    }

    #[tokio::test]
    async fn upsert_into_missing_collection_fails() {
        let store = InMemoryStore::new();
        let err = store
            .upsert("missing", vec![point("a", vec![1.0], "rust")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let store = InMemoryStore::new();
        store.ensure_collection("c", 4).await.unwrap();
        store
            .upsert("c", vec![point("a", vec![1.0; 4], "rust")])
            .await
            .unwrap();
        store.ensure_collection("c", 4).await.unwrap();

        let info = store.collection_info("c").await.unwrap();
        assert_eq!(info.points_count, 1);
        assert_eq!(info.vector_size, 4);
        assert_eq!(info.distance, "cosine");
    }

    #[tokio::test]
    async fn list_collections_sorted_with_counts() {
        let store = InMemoryStore::new();
        store.ensure_collection("beta", 2).await.unwrap();
        store.ensure_collection("alpha", 2).await.unwrap();
        store
            .upsert("beta", vec![point("a", vec![1.0, 0.0], "rust")])
            .await
            .unwrap();

        let collections = store.list_collections().await.unwrap();
        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].name, "alpha");
        assert_eq!(collections[1].points_count, 1);
    }

    #[tokio::test]
    async fn delete_collection_reports_presence() {
        let store = InMemoryStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        assert!(store.delete_collection("c").await.unwrap());
        assert!(!store.delete_collection("c").await.unwrap());
    }

    #[test]
    fn cosine_similarity_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        let sim = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }
}
