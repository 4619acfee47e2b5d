use super::SqliteStore;
use crate::error::MemoryError;
use crate::metadata::CredentialStore;
use crate::types::CredentialStatus;

type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

impl SqliteStore {
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_credential(&self, user_id: &str) -> Result<Option<String>, MemoryError> {
        let token: Option<String> =
            sqlx::query_scalar("SELECT token FROM credentials WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(token)
    }

    /// Store (or replace) the access token of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn set_credential(
        &self,
        user_id: &str,
        token: &str,
        display_name: Option<&str>,
    ) -> Result<(), MemoryError> {
        sqlx::query(
            "INSERT INTO credentials (user_id, token, display_name, connected_at) \
             VALUES (?, ?, ?, datetime('now')) \
             ON CONFLICT(user_id) DO UPDATE SET \
             token = excluded.token, \
             display_name = excluded.display_name, \
             connected_at = datetime('now')",
        )
        .bind(user_id)
        .bind(token)
        .bind(display_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn clear_credential(&self, user_id: &str) -> Result<bool, MemoryError> {
        let result = sqlx::query("DELETE FROM credentials WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Connection state without exposing the token.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn credential_status(&self, user_id: &str) -> Result<CredentialStatus, MemoryError> {
        let row: Option<(Option<String>, String)> = sqlx::query_as(
            "SELECT display_name, connected_at FROM credentials WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map_or_else(CredentialStatus::default, |(display_name, connected_at)| {
            CredentialStatus {
                connected: true,
                display_name,
                connected_at: Some(connected_at),
            }
        }))
    }
}

impl CredentialStore for SqliteStore {
    fn get_credential<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, MemoryError>> {
        Box::pin(self.get_credential(user_id))
    }

    fn set_credential<'a>(
        &'a self,
        user_id: &'a str,
        token: &'a str,
        display_name: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(self.set_credential(user_id, token, display_name))
    }

    fn clear_credential<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, MemoryError>> {
        Box::pin(self.clear_credential(user_id))
    }

    fn credential_status<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<CredentialStatus, MemoryError>> {
        Box::pin(self.credential_status(user_id))
    }
}
