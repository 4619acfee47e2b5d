//! Store contracts consumed by the ingestion pipeline and the chat service.
//!
//! [`SqliteStore`](crate::SqliteStore) implements all three; tests may swap
//! in their own implementations.

use std::future::Future;
use std::pin::Pin;

use crate::error::MemoryError;
use crate::types::{ChatRecord, CredentialStatus, NewRepository, RepositoryRecord};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait RepositoryStore: Send + Sync {
    /// Look up a repository by name, or the most recently ingested one when
    /// `name` is `None`.
    fn find_repository<'a>(
        &'a self,
        user_id: &'a str,
        name: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Option<RepositoryRecord>, MemoryError>>;

    fn insert_repository<'a>(
        &'a self,
        record: &'a NewRepository,
    ) -> BoxFuture<'a, Result<i64, MemoryError>>;

    /// Returns `false` when no row had that id.
    fn delete_repository(&self, id: i64) -> BoxFuture<'_, Result<bool, MemoryError>>;

    /// Newest first.
    fn list_repositories<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RepositoryRecord>, MemoryError>>;
}

pub trait CredentialStore: Send + Sync {
    fn get_credential<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, MemoryError>>;

    /// Insert or replace the access token for a user.
    fn set_credential<'a>(
        &'a self,
        user_id: &'a str,
        token: &'a str,
        display_name: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), MemoryError>>;

    /// Returns `false` when nothing was stored.
    fn clear_credential<'a>(&'a self, user_id: &'a str)
    -> BoxFuture<'a, Result<bool, MemoryError>>;

    fn credential_status<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<CredentialStatus, MemoryError>>;
}

pub trait ChatStore: Send + Sync {
    fn save_chat<'a>(&'a self, record: &'a ChatRecord) -> BoxFuture<'a, Result<(), MemoryError>>;

    /// Newest first, at most `limit` entries.
    fn recent_chats<'a>(
        &'a self,
        user_id: &'a str,
        limit: u32,
    ) -> BoxFuture<'a, Result<Vec<ChatRecord>, MemoryError>>;
}
