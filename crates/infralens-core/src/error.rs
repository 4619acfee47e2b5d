use infralens_index::IndexError;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Llm(#[from] infralens_llm::LlmError),

    #[error(transparent)]
    Memory(#[from] infralens_memory::MemoryError),
}

impl ChatError {
    /// True when the user has nothing ingested under the requested name.
    #[must_use]
    pub fn is_not_ingested(&self) -> bool {
        matches!(self, Self::Index(IndexError::NotIngested(_)))
    }
}
