mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, ensure};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.ingest.chunk_size > 0, "ingest.chunk_size must be positive");
        ensure!(
            self.ingest.chunk_overlap < self.ingest.chunk_size,
            "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
            self.ingest.chunk_overlap,
            self.ingest.chunk_size
        );
        ensure!(self.retrieval.top_k > 0, "retrieval.top_k must be positive");
        ensure!(
            self.retrieval.context_chars > 0,
            "retrieval.context_chars must be positive"
        );
        ensure!(
            self.vector_store.embed_batch_size > 0 && self.vector_store.upsert_batch_size > 0,
            "vector_store batch sizes must be positive"
        );
        ensure!(
            !self.ingest.extensions.is_empty(),
            "ingest.extensions must list at least one extension"
        );
        if self.llm.provider == ProviderKind::OpenAi {
            ensure!(
                self.secrets.openai_api_key.is_some(),
                "INFRALENS_OPENAI_API_KEY must be set for the openai provider"
            );
        }
        Ok(())
    }
}
