//! Application bootstrap: config resolution, provider, store and pipeline
//! construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use infralens_index::{
    ChunkerConfig, GitFetcher, IndexManager, IngestPipeline, LoaderConfig, PipelineConfig,
};
use infralens_llm::any::AnyProvider;
use infralens_llm::ollama::OllamaProvider;
use infralens_llm::openai::OpenAiProvider;
use infralens_llm::{Bm25Embedder, SparseEmbedder};
use infralens_memory::{
    CredentialStatus, QdrantOps, RepositoryRecord, SqliteStore, VectorStore,
};

use crate::chat::{ChatService, ChatSettings};
use crate::config::{Config, ProviderKind};

const DEFAULT_CONFIG_PATH: &str = "config/infralens.toml";

/// Priority: CLI `--config` > `INFRALENS_CONFIG` env > `config/infralens.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("INFRALENS_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// # Errors
///
/// Returns an error if the selected backend is missing a required secret or
/// its HTTP client cannot be built.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &config.llm.base_url,
            config.llm.model.clone(),
            config.llm.embedding_model.clone(),
        ))),
        ProviderKind::OpenAi => {
            let api_key = config
                .secrets
                .openai_api_key
                .clone()
                .context("INFRALENS_OPENAI_API_KEY not set")?;
            let provider = OpenAiProvider::new(
                api_key,
                config.llm.base_url.clone(),
                config.llm.model.clone(),
                config.llm.max_tokens,
                Some(config.llm.embedding_model.clone()),
            )?;
            Ok(AnyProvider::OpenAi(provider))
        }
    }
}

/// # Errors
///
/// Returns an error if the Qdrant client cannot be created.
pub fn create_vector_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    let ops = QdrantOps::new(&config.vector_store.qdrant_url)
        .with_context(|| format!("invalid qdrant url {}", config.vector_store.qdrant_url))?;
    Ok(Arc::new(ops))
}

/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn create_fetcher(config: &Config) -> anyhow::Result<GitFetcher> {
    let client = infralens_llm::http::default_client().context("failed to build HTTP client")?;
    Ok(GitFetcher::new(client)
        .with_api_base(config.github.api_base.clone())
        .with_clone_base(config.github.clone_base.clone())
        .with_git_bin(config.github.git_bin.clone()))
}

pub async fn health_check(provider: &AnyProvider) {
    match provider {
        AnyProvider::Ollama(ollama) => match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        },
        #[allow(unreachable_patterns)]
        _ => {}
    }
}

fn ensure_parent_dir(path: &str) -> anyhow::Result<()> {
    if path == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Everything the CLI needs, wired from one [`Config`].
pub struct App {
    store: Arc<SqliteStore>,
    github: Arc<GitFetcher>,
    pipeline: IngestPipeline<AnyProvider>,
    chat: ChatService<AnyProvider>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("pipeline", &self.pipeline)
            .field("chat", &self.chat)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Build providers and stores from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if any component cannot be constructed or the
    /// database cannot be opened.
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let provider = create_provider(config)?;
        health_check(&provider).await;

        let vectors = create_vector_store(config)?;
        ensure_parent_dir(&config.storage.sqlite_path)?;
        let store = SqliteStore::new(&config.storage.sqlite_path)
            .await
            .with_context(|| format!("failed to open {}", config.storage.sqlite_path))?;
        let github = create_fetcher(config)?;

        tracing::info!(
            provider = config.llm.provider.as_str(),
            model = %config.llm.model,
            qdrant_url = %config.vector_store.qdrant_url,
            "application ready"
        );
        Ok(Self::from_parts(config, provider, vectors, Arc::new(store), github))
    }

    /// Wire already constructed components.
    #[must_use]
    pub fn from_parts(
        config: &Config,
        provider: AnyProvider,
        vectors: Arc<dyn VectorStore>,
        store: Arc<SqliteStore>,
        github: GitFetcher,
    ) -> Self {
        let provider = Arc::new(provider);
        let sparse: Arc<dyn SparseEmbedder> = Arc::new(Bm25Embedder::default());
        let github = Arc::new(github);
        let manager = IndexManager::new(vectors).with_batch_sizes(
            config.vector_store.embed_batch_size,
            config.vector_store.upsert_batch_size,
        );

        let pipeline = IngestPipeline::new(
            github.clone(),
            manager.clone(),
            provider.clone(),
            sparse.clone(),
            store.clone(),
            store.clone(),
            PipelineConfig {
                scratch_root: config.ingest.scratch_dir.clone(),
                loader: LoaderConfig {
                    extensions: config.ingest.extensions.clone(),
                    max_file_size: config.ingest.max_file_size,
                },
                chunker: ChunkerConfig {
                    chunk_size: config.ingest.chunk_size,
                    chunk_overlap: config.ingest.chunk_overlap,
                },
                persistence: config.ingest.persistence,
            },
        );
        let chat = ChatService::new(
            provider,
            sparse,
            manager,
            store.clone(),
            store.clone(),
            ChatSettings {
                top_k: config.retrieval.top_k,
                context_chars: config.retrieval.context_chars,
                history: config.retrieval.history_persistence,
            },
        );

        Self {
            store,
            github,
            pipeline,
            chat,
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> &IngestPipeline<AnyProvider> {
        &self.pipeline
    }

    #[must_use]
    pub fn chat(&self) -> &ChatService<AnyProvider> {
        &self.chat
    }

    /// # Errors
    ///
    /// Returns an error if the metadata store query fails.
    pub async fn repositories(&self, user_id: &str) -> anyhow::Result<Vec<RepositoryRecord>> {
        Ok(self.store.list_repositories(user_id).await?)
    }

    /// Verify `token` against the GitHub API and store it for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or cannot be stored.
    pub async fn connect_github(
        &self,
        user_id: &str,
        token: &str,
    ) -> anyhow::Result<CredentialStatus> {
        let token = token.trim();
        if token.is_empty() {
            bail!("access token is empty");
        }
        let Some(login) = self.github.authenticated_user(token).await else {
            bail!("GitHub rejected the access token");
        };
        self.store
            .set_credential(user_id, token, Some(&login))
            .await
            .context("failed to store access token")?;
        tracing::info!(user_id, login = %login, "GitHub account connected");
        Ok(self.store.credential_status(user_id).await?)
    }

    /// # Errors
    ///
    /// Returns an error if the credential store query fails.
    pub async fn github_status(&self, user_id: &str) -> anyhow::Result<CredentialStatus> {
        Ok(self.store.credential_status(user_id).await?)
    }

    /// Returns `false` when nothing was connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store update fails.
    pub async fn disconnect_github(&self, user_id: &str) -> anyhow::Result<bool> {
        Ok(self.store.clear_credential(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use infralens_llm::LlmProvider;
    use infralens_llm::mock::MockProvider;
    use infralens_memory::InMemoryVectorStore;
    use serial_test::serial;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn app(server: &MockServer) -> App {
        let config = Config::default();
        let github = GitFetcher::new(reqwest::Client::new()).with_api_base(server.uri());
        App::from_parts(
            &config,
            AnyProvider::Mock(MockProvider::default()),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(SqliteStore::new(":memory:").await.unwrap()),
            github,
        )
    }

    #[test]
    #[serial]
    fn config_path_priority() {
        unsafe { std::env::remove_var("INFRALENS_CONFIG") };
        assert_eq!(
            resolve_config_path(None),
            PathBuf::from("config/infralens.toml")
        );

        unsafe { std::env::set_var("INFRALENS_CONFIG", "/etc/infralens.toml") };
        assert_eq!(
            resolve_config_path(None),
            PathBuf::from("/etc/infralens.toml")
        );
        assert_eq!(
            resolve_config_path(Some(Path::new("cli.toml"))),
            PathBuf::from("cli.toml")
        );
        unsafe { std::env::remove_var("INFRALENS_CONFIG") };
    }

    #[test]
    fn create_provider_ollama() {
        let provider = create_provider(&Config::default()).unwrap();
        assert!(matches!(provider, AnyProvider::Ollama(_)));
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn create_provider_openai_requires_key() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::OpenAi;
        config.llm.base_url = "https://api.openai.com/v1".into();
        assert!(create_provider(&config).is_err());

        config.secrets.openai_api_key = Some("sk-test".into());
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
        assert!(provider.supports_embeddings());
    }

    #[tokio::test]
    async fn vector_store_is_built_from_qdrant_url() {
        let mut config = Config::default();
        config.vector_store.qdrant_url = "http://qdrant.internal:6334".into();
        assert!(create_vector_store(&config).is_ok());
    }

    #[test]
    fn parent_dir_created_for_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested/deeper/infralens.db");
        ensure_parent_dir(db.to_str().unwrap()).unwrap();
        assert!(dir.path().join("nested/deeper").is_dir());
        ensure_parent_dir(":memory:").unwrap();
    }

    #[tokio::test]
    async fn connect_github_stores_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer ghp_valid"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"login": "octocat"})),
            )
            .mount(&server)
            .await;
        let app = app(&server).await;

        let status = app.connect_github("u1", " ghp_valid \n").await.unwrap();
        assert!(status.connected);
        assert_eq!(status.display_name.as_deref(), Some("octocat"));
        assert!(app.github_status("u1").await.unwrap().connected);

        assert!(app.disconnect_github("u1").await.unwrap());
        assert!(!app.disconnect_github("u1").await.unwrap());
        assert!(!app.github_status("u1").await.unwrap().connected);
    }

    #[tokio::test]
    async fn connect_github_rejects_bad_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let app = app(&server).await;

        assert!(app.connect_github("u1", "ghp_revoked").await.is_err());
        assert!(app.connect_github("u1", "   ").await.is_err());
        assert!(!app.github_status("u1").await.unwrap().connected);
    }

    #[tokio::test]
    async fn empty_user_has_no_repositories() {
        let server = MockServer::start().await;
        let app = app(&server).await;
        assert!(app.repositories("u1").await.unwrap().is_empty());

        let err = app.pipeline().remove("u1", "skyline").await.unwrap_err();
        assert!(err.to_string().contains("skyline"));
        let err = app.chat().answer("u1", "hello", None).await.unwrap_err();
        assert!(err.is_not_ingested());
    }
}
