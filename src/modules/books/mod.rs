//! The books feature: form validation, terminal views and page flows.

pub mod form;
pub mod pages;
pub mod views;

pub use form::{BookForm, Field, FieldError, FormEdits, FormErrors, FormMode};
pub use pages::{BooksPage, PageError};
