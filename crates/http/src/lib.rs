//! Remote data client for the book API: the [`BookApi`] port, a reqwest
//! adapter speaking the HTTP contract, and an in-memory store for demos and
//! tests.

use async_trait::async_trait;
use bookshelf_kernel::{Book, BookId, BookPatch, NewBook};

pub mod client;
pub mod error;
pub mod memory;

pub use client::HttpBookClient;
pub use error::ApiError;
pub use memory::InMemoryBookApi;

/// The five operations the remote book store exposes.
///
/// Each call is a single request; implementations never retry.
#[async_trait]
pub trait BookApi: Send + Sync {
    /// `GET /books`
    async fn list_books(&self) -> Result<Vec<Book>, ApiError>;

    /// `GET /books/{id}`
    async fn get_book(&self, id: &BookId) -> Result<Book, ApiError>;

    /// `POST /books`; the store assigns the id.
    async fn create_book(&self, book: &NewBook) -> Result<Book, ApiError>;

    /// `PUT /books/{id}` with only the fields to replace.
    async fn update_book(&self, id: &BookId, patch: &BookPatch) -> Result<Book, ApiError>;

    /// `DELETE /books/{id}`
    async fn delete_book(&self, id: &BookId) -> Result<(), ApiError>;
}
