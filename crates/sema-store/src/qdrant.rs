//! Qdrant-backed [`VectorStore`] implementation.

use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType,
    Filter, PointStruct, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    point_id::PointIdOptions, value::Kind, vectors_config,
};

use crate::error::StoreError;
use crate::vector_store::{
    BoxFuture, CollectionDetail, CollectionSummary, FieldValue, ScoredVectorPoint, VectorFilter,
    VectorPoint, VectorStore,
};

/// Payload fields that get a keyword index at collection creation, so
/// filtered search stays fast on large collections.
const INDEXED_FIELDS: &[&str] = &["language", "chunkType", "filePath"];

pub struct QdrantStore {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore").finish_non_exhaustive()
    }
}

impl QdrantStore {
    /// Connect to a Qdrant instance.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the client cannot be built.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { client })
    }

    /// Connect with an API key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the client cannot be built.
    pub fn with_api_key(url: &str, api_key: &str) -> Result<Self, StoreError> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { client })
    }
}

fn to_qdrant_filter(filter: VectorFilter) -> Filter {
    let conditions = filter
        .must
        .into_iter()
        .map(|c| match c.value {
            FieldValue::Text(s) => Condition::matches(c.field, s),
            FieldValue::Integer(i) => Condition::matches(c.field, i),
        })
        .collect::<Vec<_>>();
    Filter::must(conditions)
}

fn point_id_to_string(id: Option<qdrant_client::qdrant::PointId>) -> String {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u,
        None => String::new(),
    }
}

fn value_to_json(value: &qdrant_client::qdrant::Value) -> serde_json::Value {
    match &value.kind {
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(*i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(*d)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
    }
}

fn payload_to_json(
    payload: &HashMap<String, qdrant_client::qdrant::Value>,
) -> HashMap<String, serde_json::Value> {
    payload
        .iter()
        .map(|(k, v)| (k.clone(), value_to_json(v)))
        .collect()
}

fn json_to_payload(
    payload: HashMap<String, serde_json::Value>,
) -> Result<HashMap<String, qdrant_client::qdrant::Value>, StoreError> {
    serde_json::from_value(serde_json::Value::Object(payload.into_iter().collect()))
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

impl VectorStore for QdrantStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&collection)
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            if exists {
                return Ok(());
            }

            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&collection)
                        .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
                )
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;

            for field in INDEXED_FIELDS {
                self.client
                    .create_field_index(CreateFieldIndexCollectionBuilder::new(
                        &collection,
                        *field,
                        FieldType::Keyword,
                    ))
                    .await
                    .map_err(|e| StoreError::Collection(e.to_string()))?;
            }

            tracing::info!(collection = %collection, vector_size, "created collection");
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
            let mut structs = Vec::with_capacity(points.len());
            for point in points {
                let payload = json_to_payload(point.payload)?;
                structs.push(PointStruct::new(point.id, point.vector, payload));
            }

            self.client
                .upsert_points(UpsertPointsBuilder::new(&collection, structs))
                .await
                .map_err(|e| StoreError::Upsert(e.to_string()))?;
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
            let mut builder =
                SearchPointsBuilder::new(&collection, vector, limit).with_payload(true);
            if let Some(threshold) = score_threshold {
                builder = builder.score_threshold(threshold);
            }
            if let Some(f) = filter.filter(|f| !f.is_empty()) {
                builder = builder.filter(to_qdrant_filter(f));
            }

            let results = self
                .client
                .search_points(builder)
                .await
                .map_err(|e| StoreError::Search(e.to_string()))?;

            Ok(results
                .result
                .into_iter()
                .map(|p| ScoredVectorPoint {
                    id: point_id_to_string(p.id),
                    score: p.score,
                    payload: payload_to_json(&p.payload),
                })
                .collect())
        })
    }

    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<CollectionSummary>, StoreError>> {
        Box::pin(async move {
            let response = self
                .client
                .list_collections()
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;

            let mut collections = Vec::with_capacity(response.collections.len());
            for description in response.collections {
                match self.client.collection_info(&description.name).await {
                    Ok(info) => {
                        let result = info.result;
                        let points_count =
                            result.as_ref().and_then(|r| r.points_count).unwrap_or(0);
                        let status = result
                            .as_ref()
                            .map_or_else(|| "unknown".to_owned(), |r| r.status().as_str_name().to_lowercase());
                        collections.push(CollectionSummary {
                            name: description.name,
                            points_count,
                            status,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(collection = %description.name, error = %e, "failed to fetch collection info");
                        collections.push(CollectionSummary {
                            name: description.name,
                            points_count: 0,
                            status: "unknown".to_owned(),
                        });
                    }
                }
            }

            Ok(collections)
        })
    }

    fn collection_info(
        &self,
        collection: &str,
    ) -> BoxFuture<'_, Result<CollectionDetail, StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&collection)
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            if !exists {
                return Err(StoreError::CollectionNotFound(collection));
            }

            let info = self
                .client
                .collection_info(&collection)
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            let result = info
                .result
                .ok_or_else(|| StoreError::CollectionNotFound(collection.clone()))?;

            let (vector_size, distance) = result
                .config
                .as_ref()
                .and_then(|c| c.params.as_ref())
                .and_then(|p| p.vectors_config.as_ref())
                .and_then(|v| v.config.as_ref())
                .map_or((0, "unknown".to_owned()), |config| match config {
                    vectors_config::Config::Params(p) => {
                        (p.size, p.distance().as_str_name().to_lowercase())
                    }
                    vectors_config::Config::ParamsMap(_) => (0, "multi".to_owned()),
                });

            Ok(CollectionDetail {
                points_count: result.points_count.unwrap_or(0),
                status: result.status().as_str_name().to_lowercase(),
                name: collection,
                vector_size,
                distance,
            })
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let response = self
                .client
                .delete_collection(&collection)
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            Ok(response.result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::FieldCondition;

    #[test]
    fn filter_conversion_keeps_all_conditions() {
        let filter = VectorFilter {
            must: vec![
                FieldCondition {
                    field: "language".into(),
                    value: FieldValue::Text("python".into()),
                },
                FieldCondition {
                    field: "startLine".into(),
                    value: FieldValue::Integer(10),
                },
            ],
        };
        let qdrant_filter = to_qdrant_filter(filter);
        assert_eq!(qdrant_filter.must.len(), 2);
    }

    #[test]
    fn value_round_trip_preserves_shapes() {
        let payload: HashMap<String, serde_json::Value> = serde_json::from_value(serde_json::json!({
            "filePath": "src/lib.rs",
            "startLine": 3,
            "imports": ["use a;", "use b;"],
            "pathSegments": {"0": "src", "1": "lib.rs"},
            "context": null
        }))
        .unwrap();

        let qdrant_payload = json_to_payload(payload.clone()).unwrap();
        let back = payload_to_json(&qdrant_payload);

        assert_eq!(back.get("filePath"), payload.get("filePath"));
        assert_eq!(back.get("startLine"), payload.get("startLine"));
        assert_eq!(back.get("imports"), payload.get("imports"));
        assert_eq!(back.get("pathSegments"), payload.get("pathSegments"));
    }

    #[test]
    fn point_id_renders_both_variants() {
        assert_eq!(
            point_id_to_string(Some(qdrant_client::qdrant::PointId {
                point_id_options: Some(PointIdOptions::Num(42)),
            })),
            "42"
        );
        assert_eq!(
            point_id_to_string(Some(qdrant_client::qdrant::PointId {
                point_id_options: Some(PointIdOptions::Uuid("abc-def".into())),
            })),
            "abc-def"
        );
        assert_eq!(point_id_to_string(None), "");
    }
}
