use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use infralens_llm::SparseVector;

use crate::vector_store::{
    FieldValue, HybridQuery, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore,
    VectorStoreError,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Rank constant for reciprocal rank fusion, same default as Qdrant.
const RRF_K: f32 = 2.0;

struct StoredPoint {
    vector: Vec<f32>,
    sparse: SparseVector,
    payload: HashMap<String, serde_json::Value>,
}

struct InMemoryCollection {
    points: HashMap<String, StoredPoint>,
}

/// Process-local [`VectorStore`] for tests.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .finish_non_exhaustive()
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
    for cond in &filter.must {
        let Some(val) = payload.get(&cond.field) else {
            return false;
        };
        if !field_matches(val, &cond.value) {
            return false;
        }
    }
    for cond in &filter.must_not {
        if let Some(val) = payload.get(&cond.field)
            && field_matches(val, &cond.value)
        {
            return false;
        }
    }
    true
}

fn field_matches(val: &serde_json::Value, expected: &FieldValue) -> bool {
    match expected {
        FieldValue::Integer(i) => val.as_i64() == Some(*i),
        FieldValue::Text(s) => val.as_str() == Some(s.as_str()),
        FieldValue::AnyText(options) => val
            .as_str()
            .is_some_and(|v| options.iter().any(|o| o == v)),
    }
}

fn sort_desc(scored: &mut [(&String, f32)]) {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
}

/// Scale each query term by its inverse document frequency over `points`,
/// the formula Qdrant's `Idf` modifier applies:
/// `ln(1 + (n - df + 0.5) / (df + 0.5))`.
#[allow(clippy::cast_precision_loss)]
fn idf_weighted(query: &SparseVector, points: &HashMap<String, StoredPoint>) -> SparseVector {
    let n = points.len() as f32;
    let values = query
        .indices
        .iter()
        .zip(&query.values)
        .map(|(term, weight)| {
            let df = points
                .values()
                .filter(|p| p.sparse.indices.binary_search(term).is_ok())
                .count() as f32;
            weight * ((n - df + 0.5) / (df + 0.5)).ln_1p()
        })
        .collect();
    SparseVector {
        indices: query.indices.clone(),
        values,
    }
}

fn sparse_ranking<'a>(
    candidates: &[(&'a String, &'a StoredPoint)],
    query: &SparseVector,
    points: &HashMap<String, StoredPoint>,
) -> Vec<(&'a String, f32)> {
    let weighted = idf_weighted(query, points);
    let mut ranked: Vec<(&String, f32)> = candidates
        .iter()
        .map(|(id, sp)| (*id, sp.sparse.dot(&weighted)))
        .filter(|(_, score)| *score > 0.0)
        .collect();
    sort_desc(&mut ranked);
    ranked
}

#[allow(clippy::cast_precision_loss)]
fn rrf(rank: usize) -> f32 {
    1.0 / (RRF_K + rank as f32 + 1.0)
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        _vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.entry(collection)
                .or_insert_with(|| InMemoryCollection {
                    points: HashMap::new(),
                });
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.remove(&collection);
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Upsert(format!("collection {collection} not found"))
            })?;
            for p in points {
                col.points.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        sparse: p.sparse,
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
        query: HybridQuery,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Search(format!("collection {collection} not found"))
            })?;

            let empty_filter = VectorFilter::default();
            let f = filter.as_ref().unwrap_or(&empty_filter);
            let candidates: Vec<(&String, &StoredPoint)> = col
                .points
                .iter()
                .filter(|(_, sp)| matches_filter(&sp.payload, f))
                .collect();

            let mut dense: Vec<(&String, f32)> = candidates
                .iter()
                .map(|(id, sp)| (*id, cosine_similarity(&query.dense, &sp.vector)))
                .collect();
            sort_desc(&mut dense);

            let fused: Vec<(&String, f32)> = match query.sparse.as_ref() {
                Some(sparse_query) if !sparse_query.is_empty() => {
                    let sparse = sparse_ranking(&candidates, sparse_query, &col.points);

                    let mut scores: HashMap<&String, f32> = HashMap::new();
                    for ranking in [&dense, &sparse] {
                        for (rank, (id, _)) in ranking.iter().enumerate() {
                            *scores.entry(*id).or_insert(0.0) += rrf(rank);
                        }
                    }
                    let mut fused: Vec<(&String, f32)> = scores.into_iter().collect();
                    sort_desc(&mut fused);
                    fused
                }
                _ => dense,
            };

            #[expect(clippy::cast_possible_truncation)]
            let limit = limit as usize;
            Ok(fused
                .into_iter()
                .take(limit)
                .filter_map(|(id, score)| {
                    col.points.get(id).map(|sp| ScoredVectorPoint {
                        id: id.clone(),
                        score,
                        payload: sp.payload.clone(),
                    })
                })
                .collect())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Count(e.to_string()))?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Count(format!("collection {collection} not found"))
            })?;
            Ok(col.points.len() as u64)
        })
    }
}
