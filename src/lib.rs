//! Bookshelf application library.
//!
//! Screens of the library on top of the cached book queries.

pub mod modules;
pub mod utils;

pub use modules::books::{BookForm, BooksPage, FormEdits, PageError};
