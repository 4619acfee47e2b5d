/// One ingested repository as stored in the metadata database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    pub id: i64,
    pub user_id: String,
    pub source_url: String,
    pub name: String,
    pub collection_name: String,
    pub private: bool,
    pub files_processed: u64,
    pub chunks_stored: u64,
    /// `SQLite` `datetime('now')` text, UTC.
    pub ingested_at: String,
}

/// Fields supplied when recording a fresh ingestion; id and timestamp are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRepository {
    pub user_id: String,
    pub source_url: String,
    pub name: String,
    pub collection_name: String,
    pub private: bool,
    pub files_processed: u64,
    pub chunks_stored: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStatus {
    pub connected: bool,
    pub display_name: Option<String>,
    pub connected_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRecord {
    pub user_id: String,
    pub repository_name: Option<String>,
    pub user_message: String,
    pub assistant_response: String,
    /// Empty when the record has not been stored yet.
    pub created_at: String,
}

impl ChatRecord {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        repository_name: Option<String>,
        user_message: impl Into<String>,
        assistant_response: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            repository_name,
            user_message: user_message.into(),
            assistant_response: assistant_response.into(),
            created_at: String::new(),
        }
    }
}
