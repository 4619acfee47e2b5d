use super::SqliteStore;
use crate::error::MemoryError;
use crate::metadata::ChatStore;
use crate::types::ChatRecord;

type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

impl SqliteStore {
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn save_chat(&self, record: &ChatRecord) -> Result<(), MemoryError> {
        sqlx::query(
            "INSERT INTO chats (user_id, repository_name, user_message, assistant_response) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&record.user_id)
        .bind(record.repository_name.as_deref())
        .bind(&record.user_message)
        .bind(&record.assistant_response)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn recent_chats(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatRecord>, MemoryError> {
        let rows: Vec<(String, Option<String>, String, String, String)> = sqlx::query_as(
            "SELECT user_id, repository_name, user_message, assistant_response, created_at \
             FROM chats WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(
                |(user_id, repository_name, user_message, assistant_response, created_at)| {
                    ChatRecord {
                        user_id,
                        repository_name,
                        user_message,
                        assistant_response,
                        created_at,
                    }
                },
            )
            .collect())
    }
}

impl ChatStore for SqliteStore {
    fn save_chat<'a>(&'a self, record: &'a ChatRecord) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(self.save_chat(record))
    }

    fn recent_chats<'a>(
        &'a self,
        user_id: &'a str,
        limit: u32,
    ) -> BoxFuture<'a, Result<Vec<ChatRecord>, MemoryError>> {
        Box::pin(self.recent_chats(user_id, limit))
    }
}
