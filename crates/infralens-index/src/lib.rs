//! Repository ingestion and retrieval.
//!
//! A repository is cloned into a scratch directory, walked for supported
//! files, split into structure-aware chunks, embedded (dense + BM25 sparse)
//! and written to a per-user collection. Retrieval routes broad questions to
//! overview files and everything else to a hybrid search.

pub mod chunker;
pub mod error;
pub mod fetcher;
pub mod languages;
pub mod loader;
pub mod manager;
pub mod naming;
pub mod pipeline;
pub mod retriever;

pub use chunker::{Chunk, Chunker, ChunkerConfig};
pub use error::{CloneError, IndexError, Result};
pub use fetcher::{Fetcher, GitFetcher, RepoSlug, Visibility, parse_repo_url};
pub use loader::{Document, DocumentLoader, LoaderConfig};
pub use manager::{CollectionHandle, IndexManager, RetrievedChunk};
pub use naming::name_for;
pub use pipeline::{
    IngestFailure, IngestPipeline, IngestReport, PersistencePolicy, PipelineConfig, Stage,
};
pub use retriever::{RetrievalStrategy, format_context, retrieve};
