//! Question answering over an ingested repository.

use std::sync::Arc;

use infralens_index::{IndexError, IndexManager, PersistencePolicy, format_context, retrieve};
use infralens_llm::provider::Message;
use infralens_llm::{LlmProvider, SparseEmbedder};
use infralens_memory::{ChatRecord, ChatStore, RepositoryStore};

use crate::error::ChatError;

pub const SYSTEM_PROMPT: &str = "You are a code analysis assistant. Answer questions about the \
repository using the provided code context. When asked what the repository is or does, rely on \
the README and package manifest files in the context. If the context does not contain the \
answer, say so. Be concise.";

const NO_CONTEXT: &str = "(no relevant code was retrieved)";

#[derive(Debug, Clone, Copy)]
pub struct ChatSettings {
    pub top_k: usize,
    pub context_chars: usize,
    pub history: PersistencePolicy,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            context_chars: infralens_index::retriever::DEFAULT_CONTEXT_CHARS,
            history: PersistencePolicy::BestEffort,
        }
    }
}

pub struct ChatService<P> {
    provider: Arc<P>,
    sparse: Arc<dyn SparseEmbedder>,
    manager: IndexManager,
    repositories: Arc<dyn RepositoryStore>,
    chats: Arc<dyn ChatStore>,
    settings: ChatSettings,
}

impl<P> std::fmt::Debug for ChatService<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> ChatService<P> {
    #[must_use]
    pub fn new(
        provider: Arc<P>,
        sparse: Arc<dyn SparseEmbedder>,
        manager: IndexManager,
        repositories: Arc<dyn RepositoryStore>,
        chats: Arc<dyn ChatStore>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            provider,
            sparse,
            manager,
            repositories,
            chats,
            settings,
        }
    }

    /// Answer `query` from the named repository, or the most recently
    /// ingested one when `repo_name` is `None`.
    ///
    /// # Errors
    ///
    /// [`IndexError::NotIngested`] when no matching repository exists;
    /// retrieval and generation errors otherwise. A failed history write only
    /// fails the call under [`PersistencePolicy::Required`].
    pub async fn answer(
        &self,
        user_id: &str,
        query: &str,
        repo_name: Option<&str>,
    ) -> Result<String, ChatError> {
        let Some(record) = self
            .repositories
            .find_repository(user_id, repo_name)
            .await?
        else {
            return Err(IndexError::NotIngested(repo_name.map(str::to_owned)).into());
        };

        let handle = self
            .manager
            .open_collection(
                &record.collection_name,
                self.provider.as_ref(),
                self.sparse.as_ref(),
            )
            .await?;
        let chunks = retrieve(&handle, query, self.settings.top_k).await?;
        tracing::debug!(
            user_id,
            collection = %record.collection_name,
            chunks = chunks.len(),
            "context retrieved"
        );

        let context = if chunks.is_empty() {
            NO_CONTEXT.to_owned()
        } else {
            format_context(&chunks, self.settings.context_chars)
        };
        let messages = [
            Message::system(format!("{SYSTEM_PROMPT}\n\nContext:\n{context}")),
            Message::user(query),
        ];
        let response = self.provider.chat(&messages).await?;

        let exchange = ChatRecord::new(user_id, Some(record.name.clone()), query, response.clone());
        if let Err(e) = self.chats.save_chat(&exchange).await {
            match self.settings.history {
                PersistencePolicy::Required => return Err(e.into()),
                PersistencePolicy::BestEffort => {
                    tracing::warn!(user_id, "chat history not saved: {e}");
                }
            }
        }

        Ok(response)
    }

    /// # Errors
    ///
    /// Returns an error if the chat store query fails.
    pub async fn history(&self, user_id: &str, limit: u32) -> Result<Vec<ChatRecord>, ChatError> {
        Ok(self.chats.recent_chats(user_id, limit).await?)
    }
}
