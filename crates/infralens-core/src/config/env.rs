use std::path::PathBuf;

use super::Config;

fn parse_enum<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_value(serde_json::Value::String(raw.to_owned())) {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring invalid {key} value: {raw}");
            None
        }
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_storage();
        self.apply_env_overrides_pipeline();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("INFRALENS_LLM_PROVIDER")
            && let Some(kind) = parse_enum("INFRALENS_LLM_PROVIDER", &v)
        {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("INFRALENS_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("INFRALENS_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("INFRALENS_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("INFRALENS_OPENAI_API_KEY")
            && !v.is_empty()
        {
            self.secrets.openai_api_key = Some(v);
        }
    }

    fn apply_env_overrides_storage(&mut self) {
        if let Ok(v) = std::env::var("INFRALENS_QDRANT_URL") {
            self.vector_store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("INFRALENS_SQLITE_PATH") {
            self.storage.sqlite_path = v;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Ok(v) = std::env::var("INFRALENS_SCRATCH_DIR") {
            self.ingest.scratch_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("INFRALENS_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.chunk_size = n;
        }
        if let Ok(v) = std::env::var("INFRALENS_CHUNK_OVERLAP")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("INFRALENS_INGEST_PERSISTENCE")
            && let Some(policy) = parse_enum("INFRALENS_INGEST_PERSISTENCE", &v)
        {
            self.ingest.persistence = policy;
        }
        if let Ok(v) = std::env::var("INFRALENS_TOP_K")
            && let Ok(n) = v.parse::<usize>()
        {
            self.retrieval.top_k = n;
        }
        if let Ok(v) = std::env::var("INFRALENS_GITHUB_API_BASE") {
            self.github.api_base = v;
        }
    }
}
