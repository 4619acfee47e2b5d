//! Collection lifecycle: full replace, idempotent delete, and query handles.

use std::collections::HashMap;
use std::sync::Arc;

use infralens_llm::{LlmError, LlmProvider, SparseEmbedder};
use infralens_memory::{HybridQuery, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore};
use uuid::Uuid;

use crate::chunker::Chunk;
use crate::error::{IndexError, Result};

pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;
pub const DEFAULT_UPSERT_BATCH_SIZE: usize = 64;

/// A search hit decoded from the point payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub filename: String,
    pub source: String,
    pub chunk_index: u64,
    pub score: f32,
}

impl RetrievedChunk {
    fn from_point(point: ScoredVectorPoint) -> Self {
        let text = |key: &str| {
            point
                .payload
                .get(key)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };
        Self {
            content: text("content"),
            filename: text("filename"),
            source: text("source"),
            chunk_index: point
                .payload
                .get("chunk_index")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or_default(),
            score: point.score,
        }
    }
}

/// Owns one isolated collection per (user, repository) pair.
#[derive(Clone)]
pub struct IndexManager {
    store: Arc<dyn VectorStore>,
    embed_batch_size: usize,
    upsert_batch_size: usize,
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("embed_batch_size", &self.embed_batch_size)
            .field("upsert_batch_size", &self.upsert_batch_size)
            .finish_non_exhaustive()
    }
}

impl IndexManager {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            upsert_batch_size: DEFAULT_UPSERT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_sizes(mut self, embed: usize, upsert: usize) -> Self {
        self.embed_batch_size = embed.max(1);
        self.upsert_batch_size = upsert.max(1);
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Embed every chunk, then drop and recreate `name` with the new points.
    ///
    /// Nothing is written until all embeddings succeed. A store failure after
    /// the old collection was dropped leaves `name` missing or partial.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or any store operation fails.
    pub async fn replace_collection<P: LlmProvider>(
        &self,
        name: &str,
        chunks: &[Chunk],
        embedder: &P,
        sparse: &dyn SparseEmbedder,
    ) -> Result<usize> {
        let dense = self.embed_all(chunks, embedder).await?;
        let dimension = match dense.first() {
            Some(v) => v.len(),
            None => embedder.embed("dimension probe").await?.len(),
        };
        if let Some(bad) = dense.iter().find(|v| v.len() != dimension) {
            return Err(IndexError::Other(format!(
                "embedding dimension mismatch: expected {dimension}, got {}",
                bad.len()
            )));
        }

        if self.store.collection_exists(name).await? {
            tracing::info!(collection = name, "dropping previous collection");
            self.store.delete_collection(name).await?;
        }
        self.store
            .ensure_collection(name, u64::try_from(dimension)?)
            .await?;

        let mut points = Vec::with_capacity(chunks.len());
        for (position, (chunk, vector)) in chunks.iter().zip(dense).enumerate() {
            points.push(to_point(name, position, chunk, vector, sparse)?);
        }

        let total = points.len();
        let mut batch = Vec::with_capacity(self.upsert_batch_size);
        for point in points {
            batch.push(point);
            if batch.len() == self.upsert_batch_size {
                self.store.upsert(name, std::mem::take(&mut batch)).await?;
            }
        }
        if !batch.is_empty() {
            self.store.upsert(name, batch).await?;
        }

        tracing::info!(collection = name, points = total, dimension, "collection replaced");
        Ok(total)
    }

    async fn embed_all<P: LlmProvider>(&self, chunks: &[Chunk], embedder: &P) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(chunks.len());
        for (i, batch) in chunks.chunks(self.embed_batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(LlmError::EmbedCountMismatch {
                    expected: texts.len(),
                    actual: vectors.len(),
                }
                .into());
            }
            tracing::debug!(batch = i, size = texts.len(), "embedded batch");
            out.extend(vectors);
        }
        Ok(out)
    }

    /// Delete a collection. A missing collection is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or the delete fails.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        if self.store.collection_exists(name).await? {
            self.store.delete_collection(name).await?;
            tracing::info!(collection = name, "collection deleted");
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`IndexError::CollectionNotFound`] if `name` does not exist.
    pub async fn open_collection<'a, P: LlmProvider>(
        &'a self,
        name: &str,
        embedder: &'a P,
        sparse: &'a dyn SparseEmbedder,
    ) -> Result<CollectionHandle<'a, P>> {
        if !self.store.collection_exists(name).await? {
            return Err(IndexError::CollectionNotFound(name.to_owned()));
        }
        Ok(CollectionHandle {
            store: self.store.as_ref(),
            name: name.to_owned(),
            embedder,
            sparse,
        })
    }
}

fn to_point(
    collection: &str,
    position: usize,
    chunk: &Chunk,
    vector: Vec<f32>,
    sparse: &dyn SparseEmbedder,
) -> Result<VectorPoint> {
    let id = Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{collection}:{position}").as_bytes(),
    );
    let payload = HashMap::from([
        ("content".to_owned(), serde_json::json!(chunk.content)),
        ("filename".to_owned(), serde_json::json!(chunk.filename)),
        ("source".to_owned(), serde_json::json!(chunk.source)),
        (
            "chunk_index".to_owned(),
            serde_json::json!(u64::try_from(chunk.index)?),
        ),
        ("collection".to_owned(), serde_json::json!(collection)),
    ]);
    Ok(VectorPoint {
        id: id.to_string(),
        vector,
        sparse: sparse.sparse_embed(&chunk.content),
        payload,
    })
}

/// Query access to one existing collection.
pub struct CollectionHandle<'a, P> {
    store: &'a dyn VectorStore,
    name: String,
    embedder: &'a P,
    sparse: &'a dyn SparseEmbedder,
}

impl<P> std::fmt::Debug for CollectionHandle<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> CollectionHandle<'_, P> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hybrid search for `query`, most relevant first.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the query or the search fails.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: Option<VectorFilter>,
    ) -> Result<Vec<RetrievedChunk>> {
        let dense = self.embedder.embed(query).await?;
        let sparse = self.sparse.sparse_embed_query(query);
        let hits = self
            .store
            .search(
                &self.name,
                HybridQuery {
                    dense,
                    sparse: Some(sparse),
                },
                u64::try_from(limit)?,
                filter,
            )
            .await?;
        Ok(hits.into_iter().map(RetrievedChunk::from_point).collect())
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot count the collection.
    pub async fn count(&self) -> Result<u64> {
        Ok(self.store.count(&self.name).await?)
    }
}
