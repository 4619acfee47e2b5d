use std::path::PathBuf;

use infralens_index::PersistencePolicy;
use infralens_index::chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use infralens_index::fetcher::{DEFAULT_API_BASE, DEFAULT_CLONE_BASE};
use infralens_index::loader::{DEFAULT_EXTENSIONS, DEFAULT_MAX_FILE_SIZE};
use infralens_index::retriever::DEFAULT_CONTEXT_CHARS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenAi,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Completion cap for OpenAI-compatible backends.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_llm_model() -> String {
    "llama3.2".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            embedding_model: default_embedding_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Qdrant connection. Every CLI command is its own process, so collections
/// must outlive it; there is no process-local backend to select.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VectorStoreConfig {
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_embed_batch_size() -> usize {
    32
}

fn default_upsert_batch_size() -> usize {
    64
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            qdrant_url: default_qdrant_url(),
            embed_batch_size: default_embed_batch_size(),
            upsert_batch_size: default_upsert_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

fn default_sqlite_path() -> String {
    "data/infralens.db".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Parent of the per-collection clone directories.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub persistence: PersistencePolicy,
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("infralens")
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|&e| e.to_owned()).collect()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_file_size: default_max_file_size(),
            extensions: default_extensions(),
            persistence: PersistencePolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Per-chunk excerpt length in the prompt, in characters.
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
    /// Whether a failed chat history write fails the answer.
    #[serde(default)]
    pub history_persistence: PersistencePolicy,
}

fn default_top_k() -> usize {
    5
}

fn default_context_chars() -> usize {
    DEFAULT_CONTEXT_CHARS
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            context_chars: default_context_chars(),
            history_persistence: PersistencePolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GithubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_clone_base")]
    pub clone_base: String,
    #[serde(default = "default_git_bin")]
    pub git_bin: PathBuf,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}

fn default_clone_base() -> String {
    DEFAULT_CLONE_BASE.into()
}

fn default_git_bin() -> PathBuf {
    PathBuf::from("git")
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            clone_base: default_clone_base(),
            git_bin: default_git_bin(),
        }
    }
}

/// Secrets read from the environment at load time. Never serialized.
#[derive(Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
