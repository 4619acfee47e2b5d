//! Vector storage for repository collections plus `SQLite` bookkeeping for
//! repositories, access credentials and chat history.

pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod in_memory_store;
pub mod metadata;
pub mod qdrant_ops;
pub mod sqlite;
pub mod types;
pub mod vector_store;

pub use error::MemoryError;
#[cfg(any(test, feature = "mock"))]
pub use in_memory_store::InMemoryVectorStore;
pub use metadata::{ChatStore, CredentialStore, RepositoryStore};
pub use qdrant_ops::QdrantOps;
pub use sqlite::SqliteStore;
pub use types::{ChatRecord, CredentialStatus, NewRepository, RepositoryRecord};
pub use vector_store::{
    FieldCondition, FieldValue, HybridQuery, ScoredVectorPoint, VectorFilter, VectorPoint,
    VectorStore, VectorStoreError,
};
