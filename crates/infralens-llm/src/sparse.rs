//! BM25 sparse embeddings computed locally.
//!
//! Documents are weighted with the BM25 term-frequency saturation formula;
//! the inverse document frequency half is left to the vector store (Qdrant
//! applies it through the collection's `Idf` modifier, the in-memory store
//! weights query terms at search time). Queries use a flat
//! weight of `1.0` per distinct term, so the dot product with a document
//! vector reproduces the classic BM25 score.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sparse vector in coordinate format. Indices are unique and sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product of two sorted sparse vectors.
    #[must_use]
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// Keyword-weighted embedding used for the sparse half of hybrid search.
pub trait SparseEmbedder: Send + Sync {
    /// Embed a document for storage.
    fn sparse_embed(&self, text: &str) -> SparseVector;

    /// Embed a search query.
    fn sparse_embed_query(&self, text: &str) -> SparseVector;
}

#[derive(Debug, Clone)]
pub struct Bm25Embedder {
    k1: f32,
    b: f32,
    avg_doc_len: f32,
}

impl Default for Bm25Embedder {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            avg_doc_len: 256.0,
        }
    }
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "if", "in", "into",
    "is", "it", "its", "no", "not", "of", "on", "or", "so", "such", "that", "the", "their",
    "then", "there", "these", "they", "this", "to", "was", "will", "with",
];

impl Bm25Embedder {
    #[must_use]
    pub fn new(k1: f32, b: f32, avg_doc_len: f32) -> Self {
        Self { k1, b, avg_doc_len }
    }

    fn term_counts(text: &str) -> (BTreeMap<u32, u32>, usize) {
        let mut counts = BTreeMap::new();
        let mut len = 0usize;
        for token in tokenize(text) {
            len += 1;
            *counts.entry(token_id(&token)).or_insert(0) += 1;
        }
        (counts, len)
    }
}

impl SparseEmbedder for Bm25Embedder {
    #[allow(clippy::cast_precision_loss)]
    fn sparse_embed(&self, text: &str) -> SparseVector {
        let (counts, doc_len) = Self::term_counts(text);
        let norm = 1.0 - self.b + self.b * (doc_len as f32 / self.avg_doc_len);
        let mut vector = SparseVector::default();
        for (id, tf) in counts {
            let tf = tf as f32;
            vector.indices.push(id);
            vector
                .values
                .push(tf * (self.k1 + 1.0) / (tf + self.k1 * norm));
        }
        vector
    }

    fn sparse_embed_query(&self, text: &str) -> SparseVector {
        let (counts, _) = Self::term_counts(text);
        SparseVector {
            values: vec![1.0; counts.len()],
            indices: counts.into_keys().collect(),
        }
    }
}

/// Lower-cased alphanumeric tokens with stopwords and single characters removed.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}

fn token_id(token: &str) -> u32 {
    let hash = blake3::hash(token.as_bytes());
    let bytes = hash.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_drops_stopwords_and_short_tokens() {
        let tokens: Vec<_> = tokenize("The retry_logic is in a Module, x").collect();
        assert_eq!(tokens, vec!["retry", "logic", "module"]);
    }

    #[test]
    fn document_vector_sorted_and_unique() {
        let v = Bm25Embedder::default().sparse_embed("alpha beta alpha gamma beta alpha");
        assert_eq!(v.indices.len(), 3);
        assert!(v.indices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(v.indices.len(), v.values.len());
    }

    #[test]
    fn repeated_terms_weigh_more_but_saturate() {
        let e = Bm25Embedder::default();
        let once = e.sparse_embed("terraform");
        let many = e.sparse_embed("terraform terraform terraform terraform");
        assert!(many.values[0] > once.values[0]);
        assert!(many.values[0] < e.k1 + 1.0);
    }

    #[test]
    fn query_weights_are_flat() {
        let q = Bm25Embedder::default().sparse_embed_query("retry retry logic");
        assert_eq!(q.values, vec![1.0, 1.0]);
    }

    #[test]
    fn dot_product_matches_shared_terms() {
        let e = Bm25Embedder::default();
        let doc = e.sparse_embed("retry logic with exponential backoff");
        let hit = e.sparse_embed_query("backoff");
        let miss = e.sparse_embed_query("database");
        assert!(doc.dot(&hit) > 0.0);
        assert!(doc.dot(&miss).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_text_yields_empty_vector() {
        assert!(Bm25Embedder::default().sparse_embed("  ...  ").is_empty());
    }

    #[test]
    fn token_id_is_stable() {
        assert_eq!(token_id("qdrant"), token_id("qdrant"));
        assert_ne!(token_id("qdrant"), token_id("ollama"));
    }
}
