//! Qdrant backend with named dense + sparse vectors per collection.

use std::collections::HashMap;

use infralens_llm::SparseVector;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    Distance, FieldType, Filter, Fusion, Modifier, PointStruct, PrefetchQueryBuilder, Query,
    QueryPointsBuilder, ScoredPoint, SparseVectorParamsBuilder, SparseVectorsConfigBuilder,
    UpsertPointsBuilder, Vector, VectorInput, VectorParamsBuilder, VectorsConfigBuilder,
    value::Kind,
};

use crate::vector_store::{
    FieldCondition, FieldValue, HybridQuery, ScoredVectorPoint, VectorFilter, VectorPoint,
    VectorStore, VectorStoreError,
};

type QdrantResult<T> = Result<T, Box<qdrant_client::QdrantError>>;
type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

pub const DENSE_VECTOR: &str = "dense";
pub const SPARSE_VECTOR: &str = "sparse";

/// Candidates fetched from each side before fusion, as a multiple of the limit.
const PREFETCH_FACTOR: u64 = 4;

/// Thin wrapper over [`Qdrant`] client encapsulating collection operations.
#[derive(Clone)]
pub struct QdrantOps {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantOps").finish_non_exhaustive()
    }
}

impl QdrantOps {
    /// Create a new `QdrantOps` connected to the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str) -> QdrantResult<Self> {
        let client = Qdrant::from_url(url).build().map_err(Box::new)?;
        Ok(Self { client })
    }

    /// Ensure a collection exists with a cosine dense vector, an IDF-weighted
    /// sparse vector and a keyword index on `filename`.
    ///
    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached or collection creation fails.
    pub async fn ensure_collection(&self, collection: &str, vector_size: u64) -> QdrantResult<()> {
        if self
            .client
            .collection_exists(collection)
            .await
            .map_err(Box::new)?
        {
            return Ok(());
        }

        let mut dense = VectorsConfigBuilder::default();
        dense.add_named_vector_params(
            DENSE_VECTOR,
            VectorParamsBuilder::new(vector_size, Distance::Cosine),
        );
        let mut sparse = SparseVectorsConfigBuilder::default();
        sparse.add_named_vector_params(
            SPARSE_VECTOR,
            SparseVectorParamsBuilder::default().modifier(Modifier::Idf as i32),
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(dense)
                    .sparse_vectors_config(sparse),
            )
            .await
            .map_err(Box::new)?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                collection,
                "filename",
                FieldType::Keyword,
            ))
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// Check whether a collection exists.
    ///
    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached.
    pub async fn collection_exists(&self, collection: &str) -> QdrantResult<bool> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(Box::new)
    }

    /// Delete a collection. Missing collections are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be deleted.
    pub async fn delete_collection(&self, collection: &str) -> QdrantResult<()> {
        if !self.collection_exists(collection).await? {
            return Ok(());
        }
        self.client
            .delete_collection(collection)
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// Upsert points into a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn upsert(&self, collection: &str, points: Vec<PointStruct>) -> QdrantResult<()> {
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// Hybrid search: dense and sparse prefetches fused with RRF. Falls back to
    /// a plain dense query when no sparse vector is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn hybrid_search(
        &self,
        collection: &str,
        dense: Vec<f32>,
        sparse: Option<SparseVector>,
        limit: u64,
        filter: Option<Filter>,
    ) -> QdrantResult<Vec<ScoredPoint>> {
        let mut builder = QueryPointsBuilder::new(collection)
            .limit(limit)
            .with_payload(true);

        match sparse.filter(|s| !s.is_empty()) {
            Some(sparse) => {
                let prefetch_limit = limit.saturating_mul(PREFETCH_FACTOR);
                let mut dense_prefetch = PrefetchQueryBuilder::default()
                    .query(Query::new_nearest(dense))
                    .using(DENSE_VECTOR)
                    .limit(prefetch_limit);
                let mut sparse_prefetch = PrefetchQueryBuilder::default()
                    .query(Query::new_nearest(VectorInput::new_sparse(
                        sparse.indices,
                        sparse.values,
                    )))
                    .using(SPARSE_VECTOR)
                    .limit(prefetch_limit);
                if let Some(f) = filter.clone() {
                    dense_prefetch = dense_prefetch.filter(f.clone());
                    sparse_prefetch = sparse_prefetch.filter(f);
                }
                builder = builder
                    .add_prefetch(dense_prefetch)
                    .add_prefetch(sparse_prefetch)
                    .query(Query::new_fusion(Fusion::Rrf));
            }
            None => {
                builder = builder.query(Query::new_nearest(dense)).using(DENSE_VECTOR);
            }
        }
        if let Some(f) = filter {
            builder = builder.filter(f);
        }

        let response = self.client.query(builder).await.map_err(Box::new)?;
        Ok(response.result)
    }

    /// Exact number of points in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the count request fails.
    pub async fn count(&self, collection: &str) -> QdrantResult<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(Box::new)?;
        Ok(response.result.map_or(0, |r| r.count))
    }

    /// Convert a JSON value to a Qdrant payload map.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if deserialization fails.
    pub fn json_to_payload(
        value: serde_json::Value,
    ) -> Result<HashMap<String, qdrant_client::qdrant::Value>, serde_json::Error> {
        serde_json::from_value(value)
    }
}

impl VectorStore for QdrantOps {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ensure_collection(&collection, vector_size)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.delete_collection(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let qdrant_points = points
                .into_iter()
                .map(vector_point_to_qdrant)
                .collect::<Result<Vec<_>, _>>()?;
            self.upsert(&collection, qdrant_points)
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))
        })
    }

    fn search(
        &self,
        collection: &str,
        query: HybridQuery,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let qdrant_filter = filter.map(vector_filter_to_qdrant);
            let results = self
                .hybrid_search(&collection, query.dense, query.sparse, limit, qdrant_filter)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            Ok(results.into_iter().map(scored_point_to_vector).collect())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.count(&collection)
                .await
                .map_err(|e| VectorStoreError::Count(e.to_string()))
        })
    }
}

fn vector_point_to_qdrant(point: VectorPoint) -> Result<PointStruct, VectorStoreError> {
    let payload = QdrantOps::json_to_payload(serde_json::Value::Object(
        point.payload.into_iter().collect(),
    ))
    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;

    let vectors: HashMap<String, Vector> = HashMap::from([
        (DENSE_VECTOR.to_owned(), Vector::from(point.vector)),
        (
            SPARSE_VECTOR.to_owned(),
            Vector::new_sparse(point.sparse.indices, point.sparse.values),
        ),
    ]);
    Ok(PointStruct::new(point.id, vectors, payload))
}

fn vector_filter_to_qdrant(filter: VectorFilter) -> Filter {
    let must: Vec<_> = filter
        .must
        .into_iter()
        .map(field_condition_to_qdrant)
        .collect();
    let must_not: Vec<_> = filter
        .must_not
        .into_iter()
        .map(field_condition_to_qdrant)
        .collect();

    let mut f = Filter::default();
    if !must.is_empty() {
        f.must = must;
    }
    if !must_not.is_empty() {
        f.must_not = must_not;
    }
    f
}

fn field_condition_to_qdrant(cond: FieldCondition) -> Condition {
    match cond.value {
        FieldValue::Integer(v) => Condition::matches(cond.field, v),
        FieldValue::Text(v) => Condition::matches(cond.field, v),
        FieldValue::AnyText(v) => Condition::matches(cond.field, v),
    }
}

fn scored_point_to_vector(point: ScoredPoint) -> ScoredVectorPoint {
    let payload: HashMap<String, serde_json::Value> = point
        .payload
        .into_iter()
        .filter_map(|(k, v)| {
            let json_val = match v.kind? {
                Kind::StringValue(s) => serde_json::Value::String(s),
                Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
                Kind::DoubleValue(d) => {
                    serde_json::Number::from_f64(d).map(serde_json::Value::Number)?
                }
                Kind::BoolValue(b) => serde_json::Value::Bool(b),
                _ => return None,
            };
            Some((k, json_val))
        })
        .collect();

    let id = match point.id.and_then(|pid| pid.point_id_options) {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    };

    ScoredVectorPoint {
        id,
        score: point.score,
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_valid_url() {
        let ops = QdrantOps::new("http://localhost:6334");
        assert!(ops.is_ok());
    }

    #[test]
    fn new_invalid_url() {
        let ops = QdrantOps::new("not a valid url");
        assert!(ops.is_err());
    }

    #[test]
    fn debug_format() {
        let ops = QdrantOps::new("http://localhost:6334").unwrap();
        let dbg = format!("{ops:?}");
        assert!(dbg.contains("QdrantOps"));
    }

    #[test]
    fn json_to_payload_valid() {
        let value = serde_json::json!({"filename": "README.md", "chunk_index": 3});
        let payload = QdrantOps::json_to_payload(value).unwrap();
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn vector_point_carries_both_vectors() {
        let point = VectorPoint {
            id: "2f1b4c3e-8a4d-4b8e-9d51-3f0f7c9b2a10".into(),
            vector: vec![0.1, 0.2],
            sparse: SparseVector {
                indices: vec![3, 9],
                values: vec![0.5, 1.5],
            },
            payload: HashMap::from([("filename".into(), serde_json::json!("main.tf"))]),
        };
        let qp = vector_point_to_qdrant(point).unwrap();
        assert!(qp.vectors.is_some());
        assert!(qp.payload.contains_key("filename"));
    }

    #[test]
    fn filter_conversion_keeps_must_and_must_not() {
        let filter = VectorFilter {
            must: vec![FieldCondition {
                field: "filename".into(),
                value: FieldValue::AnyText(vec!["README.md".into(), "Cargo.toml".into()]),
            }],
            must_not: vec![FieldCondition {
                field: "chunk_index".into(),
                value: FieldValue::Integer(0),
            }],
        };
        let f = vector_filter_to_qdrant(filter);
        assert_eq!(f.must.len(), 1);
        assert_eq!(f.must_not.len(), 1);
        assert!(f.should.is_empty());
    }

    #[test]
    fn empty_filter_converts_to_default() {
        let f = vector_filter_to_qdrant(VectorFilter::default());
        assert!(f.must.is_empty());
        assert!(f.must_not.is_empty());
    }
}
