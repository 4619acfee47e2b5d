use super::SqliteStore;
use crate::error::MemoryError;
use crate::metadata::RepositoryStore;
use crate::types::{NewRepository, RepositoryRecord};

type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

type RepositoryTuple = (i64, String, String, String, String, bool, i64, i64, String);

const SELECT_COLUMNS: &str = "SELECT id, user_id, source_url, name, collection_name, private, \
     files_processed, chunks_stored, ingested_at FROM repositories";

fn row_from_tuple(t: RepositoryTuple) -> Result<RepositoryRecord, MemoryError> {
    Ok(RepositoryRecord {
        id: t.0,
        user_id: t.1,
        source_url: t.2,
        name: t.3,
        collection_name: t.4,
        private: t.5,
        files_processed: u64::try_from(t.6)?,
        chunks_stored: u64::try_from(t.7)?,
        ingested_at: t.8,
    })
}

impl SqliteStore {
    /// Find a repository by name, or the latest ingestion when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_repository(
        &self,
        user_id: &str,
        name: Option<&str>,
    ) -> Result<Option<RepositoryRecord>, MemoryError> {
        let row: Option<RepositoryTuple> = match name {
            Some(name) => {
                sqlx::query_as(&format!(
                    "{SELECT_COLUMNS} WHERE user_id = ? AND name = ? \
                     ORDER BY ingested_at DESC, id DESC LIMIT 1"
                ))
                .bind(user_id)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "{SELECT_COLUMNS} WHERE user_id = ? ORDER BY ingested_at DESC, id DESC LIMIT 1"
                ))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        row.map(row_from_tuple).transpose()
    }

    /// Insert a repository record and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails or a counter does not fit `i64`.
    pub async fn insert_repository(&self, record: &NewRepository) -> Result<i64, MemoryError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO repositories \
             (user_id, source_url, name, collection_name, private, files_processed, chunks_stored) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&record.user_id)
        .bind(&record.source_url)
        .bind(&record.name)
        .bind(&record.collection_name)
        .bind(record.private)
        .bind(i64::try_from(record.files_processed)?)
        .bind(i64::try_from(record.chunks_stored)?)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_repository(&self, id: i64) -> Result<bool, MemoryError> {
        let result = sqlx::query("DELETE FROM repositories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All repositories of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_repositories(
        &self,
        user_id: &str,
    ) -> Result<Vec<RepositoryRecord>, MemoryError> {
        let rows: Vec<RepositoryTuple> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ? ORDER BY ingested_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_from_tuple).collect()
    }
}

impl RepositoryStore for SqliteStore {
    fn find_repository<'a>(
        &'a self,
        user_id: &'a str,
        name: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Option<RepositoryRecord>, MemoryError>> {
        Box::pin(self.find_repository(user_id, name))
    }

    fn insert_repository<'a>(
        &'a self,
        record: &'a NewRepository,
    ) -> BoxFuture<'a, Result<i64, MemoryError>> {
        Box::pin(self.insert_repository(record))
    }

    fn delete_repository(&self, id: i64) -> BoxFuture<'_, Result<bool, MemoryError>> {
        Box::pin(self.delete_repository(id))
    }

    fn list_repositories<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RepositoryRecord>, MemoryError>> {
        Box::pin(self.list_repositories(user_id))
    }
}
