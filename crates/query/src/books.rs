//! Book reads as cached queries, writes as invalidating mutations.

use std::sync::Arc;

use bookshelf_http::BookApi;
use bookshelf_kernel::{Book, BookId, BookPatch, NewBook};

use crate::{QueryClient, QueryError, QueryKey, QueryState};

/// Cached access to the remote book store.
///
/// Reads go through the shared [`QueryClient`]. Writes are never applied to
/// the cache optimistically: a successful write invalidates the affected keys
/// so the next read goes back to the API.
#[derive(Clone)]
pub struct BookQueries {
    api: Arc<dyn BookApi>,
    client: QueryClient,
}

impl BookQueries {
    pub fn new(api: Arc<dyn BookApi>, client: QueryClient) -> Self {
        Self { api, client }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    /// All books, cached under `["books"]`.
    pub async fn books(&self) -> Result<Vec<Book>, QueryError> {
        let api = Arc::clone(&self.api);
        self.client
            .fetch_query(&QueryKey::books(), || async move { api.list_books().await })
            .await
    }

    /// Force a list refetch regardless of freshness.
    pub async fn refetch_books(&self) -> Result<Vec<Book>, QueryError> {
        let api = Arc::clone(&self.api);
        self.client
            .refetch_query(&QueryKey::books(), || async move { api.list_books().await })
            .await
    }

    /// One book, cached under `["books", id]`. A blank id is a disabled query
    /// and never reaches the API.
    pub async fn book(&self, id: &BookId) -> Result<Book, QueryError> {
        let key = QueryKey::book(id);
        if id.is_blank() {
            return Err(QueryError::Disabled {
                key: key.to_string(),
            });
        }

        let api = Arc::clone(&self.api);
        let id = id.clone();
        self.client
            .fetch_query(&key, || async move { api.get_book(&id).await })
            .await
    }

    pub fn books_state(&self) -> QueryState<Vec<Book>> {
        self.client.query_state(&QueryKey::books())
    }

    pub fn book_state(&self, id: &BookId) -> QueryState<Book> {
        if id.is_blank() {
            return QueryState::Idle;
        }
        self.client.query_state(&QueryKey::book(id))
    }

    pub async fn create_book(&self, book: &NewBook) -> Result<Book, QueryError> {
        let created = self.api.create_book(book).await?;
        tracing::info!(id = %created.id, title = %created.title, "book created");
        self.client.invalidate_queries(&QueryKey::books());
        Ok(created)
    }

    pub async fn update_book(&self, id: &BookId, patch: &BookPatch) -> Result<Book, QueryError> {
        let updated = self.api.update_book(id, patch).await?;
        tracing::info!(id = %updated.id, "book updated");
        self.client.invalidate_queries(&QueryKey::books());
        self.client.invalidate_queries(&QueryKey::book(&updated.id));
        Ok(updated)
    }

    pub async fn delete_book(&self, id: &BookId) -> Result<(), QueryError> {
        self.api.delete_book(id).await?;
        tracing::info!(%id, "book deleted");
        self.client.invalidate_queries(&QueryKey::books());
        Ok(())
    }
}
