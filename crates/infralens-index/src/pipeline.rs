//! Ingestion pipeline: access check, clone, load, chunk, index, persist,
//! cleanup. Each failure is tagged with the stage it happened in.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use infralens_llm::{LlmProvider, SparseEmbedder};
use infralens_memory::{CredentialStore, NewRepository, RepositoryRecord, RepositoryStore};
use serde::{Deserialize, Serialize};

use crate::chunker::{Chunk, Chunker, ChunkerConfig};
use crate::error::IndexError;
use crate::fetcher::{Fetcher, parse_repo_url};
use crate::loader::{DocumentLoader, LoaderConfig};
use crate::manager::IndexManager;
use crate::naming::name_for;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Access,
    Clone,
    Load,
    Chunk,
    Index,
    Persist,
    Cleanup,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Access => "access",
            Self::Clone => "clone",
            Self::Load => "load",
            Self::Chunk => "chunk",
            Self::Index => "index",
            Self::Persist => "persist",
            Self::Cleanup => "cleanup",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("ingestion failed at {stage} stage: {error}")]
pub struct IngestFailure {
    pub stage: Stage,
    #[source]
    pub error: IndexError,
}

impl IngestFailure {
    #[must_use]
    pub fn new(stage: Stage, error: impl Into<IndexError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

fn at(stage: Stage) -> impl FnOnce(IndexError) -> IngestFailure {
    move |error| IngestFailure { stage, error }
}

/// What happens when the repository record cannot be written after the
/// collection was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistencePolicy {
    /// Log and report `persisted = false`; the collection stays queryable
    /// by name but is not listed.
    #[default]
    BestEffort,
    /// Fail the ingestion at [`Stage::Persist`].
    Required,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub scratch_root: PathBuf,
    pub loader: LoaderConfig,
    pub chunker: ChunkerConfig,
    pub persistence: PersistencePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir().join("infralens"),
            loader: LoaderConfig::default(),
            chunker: ChunkerConfig::default(),
            persistence: PersistencePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub repository_name: String,
    pub collection_name: String,
    pub private: bool,
    pub files_processed: usize,
    pub chunks_stored: usize,
    pub persisted: bool,
    pub record_id: Option<i64>,
}

/// Working directory for one ingestion: a direct child of `root` named by
/// the digest of `collection`. User ids are free text and never become path
/// components.
///
/// # Errors
///
/// Returns an error if the joined path is not a direct child of `root`.
pub fn scratch_dir_for(root: &Path, collection: &str) -> Result<PathBuf, IndexError> {
    let path = root.join(blake3::hash(collection.as_bytes()).to_hex().as_str());
    if path.parent() != Some(root) {
        return Err(IndexError::Other(format!(
            "scratch path {} escapes {}",
            path.display(),
            root.display()
        )));
    }
    Ok(path)
}

/// Removes the scratch directory when dropped, on every exit path.
struct ScratchDir {
    path: PathBuf,
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "scratch directory removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                stage = %Stage::Cleanup,
                path = %self.path.display(),
                "failed to remove scratch directory: {e}"
            ),
        }
    }
}

pub struct IngestPipeline<P> {
    fetcher: Arc<dyn Fetcher>,
    manager: IndexManager,
    provider: Arc<P>,
    sparse: Arc<dyn SparseEmbedder>,
    repositories: Arc<dyn RepositoryStore>,
    credentials: Arc<dyn CredentialStore>,
    config: PipelineConfig,
}

impl<P> std::fmt::Debug for IngestPipeline<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestPipeline")
            .field("manager", &self.manager)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> IngestPipeline<P> {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        manager: IndexManager,
        provider: Arc<P>,
        sparse: Arc<dyn SparseEmbedder>,
        repositories: Arc<dyn RepositoryStore>,
        credentials: Arc<dyn CredentialStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            fetcher,
            manager,
            provider,
            sparse,
            repositories,
            credentials,
            config,
        }
    }

    #[must_use]
    pub fn manager(&self) -> &IndexManager {
        &self.manager
    }

    /// Ingest `repo_url` for `user_id`, fully replacing any previous
    /// ingestion of the same repository name.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage and its error. Persistence failures
    /// only fail the run under [`PersistencePolicy::Required`].
    pub async fn ingest(
        &self,
        user_id: &str,
        repo_url: &str,
    ) -> Result<IngestReport, IngestFailure> {
        let slug = parse_repo_url(repo_url).map_err(at(Stage::Access))?;
        let collection = name_for(user_id, &slug.name);
        tracing::info!(user_id, repo = %slug, collection = %collection, "ingestion started");

        let credential = self
            .credentials
            .get_credential(user_id)
            .await
            .map_err(|e| IngestFailure::new(Stage::Access, e))?;
        let private = self
            .fetcher
            .check_visibility(repo_url, credential.as_deref())
            .await
            .is_private();
        if private && credential.is_none() {
            return Err(IngestFailure::new(
                Stage::Access,
                IndexError::AccessDenied(slug.to_string()),
            ));
        }

        let scratch = ScratchDir {
            path: scratch_dir_for(&self.config.scratch_root, &collection)
                .map_err(at(Stage::Clone))?,
        };
        if let Some(parent) = scratch.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IngestFailure::new(Stage::Clone, e))?;
        }
        Fetcher::clone_into(&*self.fetcher, repo_url, &scratch.path, credential.as_deref())
            .await
            .map_err(at(Stage::Clone))?;
        tracing::info!(collection = %collection, stage = %Stage::Clone, "repository cloned");

        let (files_processed, chunks) = self.load_and_chunk(&scratch.path).await?;
        if files_processed == 0 {
            return Err(IngestFailure::new(
                Stage::Load,
                IndexError::Parse(format!("no supported files found in {slug}")),
            ));
        }
        tracing::info!(
            collection = %collection,
            files_processed,
            chunks = chunks.len(),
            "repository chunked"
        );

        let chunks_stored = self
            .manager
            .replace_collection(
                &collection,
                &chunks,
                self.provider.as_ref(),
                self.sparse.as_ref(),
            )
            .await
            .map_err(at(Stage::Index))?;

        let record = NewRepository {
            user_id: user_id.to_owned(),
            source_url: repo_url.to_owned(),
            name: slug.name.clone(),
            collection_name: collection.clone(),
            private,
            files_processed: u64::try_from(files_processed)
                .map_err(|e| IngestFailure::new(Stage::Persist, e))?,
            chunks_stored: u64::try_from(chunks_stored)
                .map_err(|e| IngestFailure::new(Stage::Persist, e))?,
        };
        let (persisted, record_id) = match self.persist(&record).await {
            Ok(id) => (true, Some(id)),
            Err(e) => match self.config.persistence {
                PersistencePolicy::Required => return Err(IngestFailure::new(Stage::Persist, e)),
                PersistencePolicy::BestEffort => {
                    tracing::warn!(
                        collection = %collection,
                        stage = %Stage::Persist,
                        "repository record not saved, collection kept: {e}"
                    );
                    (false, None)
                }
            },
        };

        drop(scratch);
        tracing::info!(
            collection = %collection,
            files_processed,
            chunks_stored,
            persisted,
            "ingestion finished"
        );

        Ok(IngestReport {
            repository_name: slug.name,
            collection_name: collection,
            private,
            files_processed,
            chunks_stored,
            persisted,
            record_id,
        })
    }

    async fn load_and_chunk(&self, root: &Path) -> Result<(usize, Vec<Chunk>), IngestFailure> {
        let loader = DocumentLoader::new(self.config.loader.clone());
        let root_owned = root.to_path_buf();
        let docs = tokio::task::spawn_blocking(move || loader.load(&root_owned).collect::<Vec<_>>())
            .await
            .map_err(|e| IngestFailure::new(Stage::Load, IndexError::Other(e.to_string())))?;

        let files = docs.len();
        let chunker = Chunker::new(self.config.chunker);
        let chunks = tokio::task::spawn_blocking(move || {
            docs.iter().flat_map(|d| chunker.split(d)).collect::<Vec<_>>()
        })
        .await
        .map_err(|e| IngestFailure::new(Stage::Chunk, IndexError::Other(e.to_string())))?;
        Ok((files, chunks))
    }

    /// Replace the record of the same user and repository name. The new
    /// record is written before the old one is dropped, so a failed insert
    /// leaves the previous record in place.
    async fn persist(&self, record: &NewRepository) -> Result<i64, IndexError> {
        let previous = self
            .repositories
            .find_repository(&record.user_id, Some(&record.name))
            .await?;
        let id = self.repositories.insert_repository(record).await?;
        if let Some(previous) = previous.filter(|p| p.id != id)
            && let Err(e) = self.repositories.delete_repository(previous.id).await
        {
            tracing::warn!(
                collection = %record.collection_name,
                previous_id = previous.id,
                "stale repository record not removed: {e}"
            );
        }
        Ok(id)
    }

    /// Delete a repository's collection, then its record.
    ///
    /// # Errors
    ///
    /// [`IndexError::NotIngested`] when no record exists for `repo_name`.
    pub async fn remove(
        &self,
        user_id: &str,
        repo_name: &str,
    ) -> Result<RepositoryRecord, IndexError> {
        let Some(record) = self
            .repositories
            .find_repository(user_id, Some(repo_name))
            .await?
        else {
            return Err(IndexError::NotIngested(Some(repo_name.to_owned())));
        };
        self.manager.delete_collection(&record.collection_name).await?;
        self.repositories.delete_repository(record.id).await?;
        tracing::info!(
            user_id,
            repo = repo_name,
            collection = %record.collection_name,
            "repository removed"
        );
        Ok(record)
    }
}
