//! Generation and embedding providers behind a single contract.
//!
//! Dense embeddings and chat completions come from a remote backend (Ollama
//! or any OpenAI-compatible endpoint); sparse keyword vectors are computed
//! locally with BM25 term weighting.

pub mod any;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod sparse;

pub use error::LlmError;
pub use provider::LlmProvider;
pub use sparse::{Bm25Embedder, SparseEmbedder, SparseVector};
