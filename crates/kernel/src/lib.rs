//! Shared building blocks for Bookshelf: the book entity schema and the
//! layered settings every binary loads at startup.

pub mod book;
pub mod settings;

pub use book::{Book, BookId, BookPatch, BookStatus, NewBook, ParseStatusError};
pub use settings::Settings;
