//! In-process book store speaking the same contract as the remote API.
//!
//! Backs the `--demo` mode of the command line and the cache tests, where
//! counting calls per operation shows what actually reached the "network".

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bookshelf_kernel::{Book, BookId, BookPatch, BookStatus, NewBook};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{ApiError, BookApi};

const REQUIRED_FIELDS_MESSAGE: &str = "all fields are required: title, author, description, \
publishedDate, genre, pages (>0), language, status";

/// Number of calls received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub get: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

#[derive(Debug, Default)]
struct Counters {
    list: AtomicUsize,
    get: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

/// Book store kept in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryBookApi {
    books: RwLock<Vec<Book>>,
    counters: Counters,
}

impl InMemoryBookApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_books(books: Vec<Book>) -> Self {
        Self {
            books: RwLock::new(books),
            counters: Counters::default(),
        }
    }

    /// Store seeded with the demonstration library.
    pub fn with_sample_books() -> Self {
        Self::with_books(sample_books())
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list: self.counters.list.load(Ordering::SeqCst),
            get: self.counters.get.load(Ordering::SeqCst),
            create: self.counters.create.load(Ordering::SeqCst),
            update: self.counters.update.load(Ordering::SeqCst),
            delete: self.counters.delete.load(Ordering::SeqCst),
        }
    }
}

fn not_found(id: &BookId) -> ApiError {
    tracing::debug!(%id, "book not found in memory store");
    ApiError::not_found("Book not found").for_book(id.as_str())
}

fn validate_new_book(book: &NewBook) -> Result<(), ApiError> {
    let blank = [
        &book.title,
        &book.author,
        &book.description,
        &book.published_date,
        &book.genre,
        &book.language,
    ]
    .iter()
    .any(|value| value.is_empty());

    if blank || book.pages == 0 {
        return Err(ApiError::status(400, REQUIRED_FIELDS_MESSAGE));
    }
    Ok(())
}

#[async_trait]
impl BookApi for InMemoryBookApi {
    async fn list_books(&self) -> Result<Vec<Book>, ApiError> {
        self.counters.list.fetch_add(1, Ordering::SeqCst);
        Ok(self.books.read().await.clone())
    }

    async fn get_book(&self, id: &BookId) -> Result<Book, ApiError> {
        self.counters.get.fetch_add(1, Ordering::SeqCst);
        self.books
            .read()
            .await
            .iter()
            .find(|book| &book.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn create_book(&self, book: &NewBook) -> Result<Book, ApiError> {
        self.counters.create.fetch_add(1, Ordering::SeqCst);
        validate_new_book(book)?;

        let created = book.clone().with_id(BookId::new(Uuid::now_v7().to_string()));
        self.books.write().await.push(created.clone());
        tracing::debug!(id = %created.id, "book stored in memory");
        Ok(created)
    }

    async fn update_book(&self, id: &BookId, patch: &BookPatch) -> Result<Book, ApiError> {
        self.counters.update.fetch_add(1, Ordering::SeqCst);
        let mut books = self.books.write().await;
        let book = books
            .iter_mut()
            .find(|book| &book.id == id)
            .ok_or_else(|| not_found(id))?;
        patch.apply(book);
        Ok(book.clone())
    }

    async fn delete_book(&self, id: &BookId) -> Result<(), ApiError> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        let mut books = self.books.write().await;
        let before = books.len();
        books.retain(|book| &book.id != id);
        if books.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }
}

/// The five demonstration books, ids "1" to "5".
pub fn sample_books() -> Vec<Book> {
    let entry = |id: &str,
                 title: &str,
                 author: &str,
                 description: &str,
                 published_date: &str,
                 genre: &str,
                 pages: u32,
                 status: BookStatus| Book {
        id: BookId::from(id),
        title: title.to_string(),
        author: author.to_string(),
        description: description.to_string(),
        published_date: published_date.to_string(),
        genre: genre.to_string(),
        pages,
        language: "English".to_string(),
        status,
    };

    vec![
        entry(
            "1",
            "The Great Gatsby",
            "F. Scott Fitzgerald",
            "A story of the fabulously wealthy Jay Gatsby and his love for the beautiful Daisy Buchanan.",
            "1925-04-10",
            "Fiction",
            180,
            BookStatus::Available,
        ),
        entry(
            "2",
            "To Kill a Mockingbird",
            "Harper Lee",
            "The story of young Scout Finch and her father Atticus in a racially divided Alabama town.",
            "1960-07-11",
            "Fiction",
            281,
            BookStatus::Borrowed,
        ),
        entry(
            "3",
            "1984",
            "George Orwell",
            "A dystopian novel about totalitarianism and surveillance society.",
            "1949-06-08",
            "Science Fiction",
            328,
            BookStatus::Available,
        ),
        entry(
            "4",
            "Pride and Prejudice",
            "Jane Austen",
            "A romantic novel of manners that follows the emotional development of Elizabeth Bennet.",
            "1813-01-28",
            "Romance",
            432,
            BookStatus::Reserved,
        ),
        entry(
            "5",
            "The Hobbit",
            "J.R.R. Tolkien",
            "A fantasy novel about a hobbit's journey to reclaim a dwarf kingdom.",
            "1937-09-21",
            "Fantasy",
            366,
            BookStatus::Available,
        ),
    ]
}
