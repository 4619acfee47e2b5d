//! Error types for infralens-index.

use std::num::TryFromIntError;

/// Why a clone failed. Messages never include the access token.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CloneError {
    #[error("authentication failed: check that the access token is valid and has repository access")]
    Auth,

    #[error("repository not found: check the URL, or connect an access token for private repositories")]
    NotFound,

    #[error("clone failed: {0}")]
    Transport(String),
}

/// Errors raised by ingestion and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Clone(#[from] CloneError),

    /// Private repository and no stored credential.
    #[error("access denied: {0} is private and no access token is connected")]
    AccessDenied(String),

    #[error("invalid repository URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The repository tree yielded nothing indexable.
    #[error("parse failed: {0}")]
    Parse(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] infralens_llm::LlmError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] infralens_memory::VectorStoreError),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("no ingested repository found{}", .0.as_deref().map(|n| format!(" named {n}")).unwrap_or_default())]
    NotIngested(Option<String>),

    #[error("metadata store error: {0}")]
    Metadata(#[from] infralens_memory::MemoryError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] TryFromIntError),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
