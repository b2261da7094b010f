//! Page flows: each one runs the queries or mutations a screen needs and
//! returns the text to show.

use bookshelf_kernel::{BookId, BookPatch};
use bookshelf_query::{BookQueries, QueryError};
use thiserror::Error;

use crate::modules::books::form::{BookForm, FormEdits, FormErrors};
use crate::modules::books::views::{
    render_dashboard, render_detail, render_form_errors, render_query_error,
};

pub const CREATED_MESSAGE: &str = "Book created successfully";
pub const UPDATED_MESSAGE: &str = "Book updated successfully!";
pub const DELETED_MESSAGE: &str = "Book deleted successfully";
pub const UNCHANGED_MESSAGE: &str = "No changes to save";

#[derive(Debug, Error)]
pub enum PageError {
    #[error("invalid form: {0}")]
    Invalid(FormErrors),
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl PageError {
    /// What the user sees when a page cannot be shown.
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(errors) => render_form_errors(errors),
            Self::Query(error) => render_query_error(error),
        }
    }
}

/// The screens of the library: dashboard, detail, add, edit and delete.
#[derive(Clone)]
pub struct BooksPage {
    queries: BookQueries,
    color: bool,
}

impl BooksPage {
    pub fn new(queries: BookQueries, color: bool) -> Self {
        Self { queries, color }
    }

    pub fn queries(&self) -> &BookQueries {
        &self.queries
    }

    pub async fn dashboard(&self) -> Result<String, PageError> {
        let books = self.queries.books().await?;
        Ok(render_dashboard(&books, self.color))
    }

    pub async fn detail(&self, id: &BookId) -> Result<String, PageError> {
        let book = self.queries.book(id).await?;
        Ok(render_detail(&book, self.color))
    }

    /// Validates the form, creates the book and lands on the dashboard.
    pub async fn add(&self, form: &BookForm) -> Result<String, PageError> {
        let new_book = form.validate().map_err(PageError::Invalid)?;
        self.queries.create_book(&new_book).await?;
        let dashboard = self.dashboard().await?;
        Ok(format!("{CREATED_MESSAGE}\n\n{dashboard}"))
    }

    /// Loads the book into a form, applies `edits`, and sends only the
    /// fields that changed. Lands on the detail page.
    pub async fn edit(&self, id: &BookId, edits: &FormEdits) -> Result<String, PageError> {
        let current = self.queries.book(id).await?;
        let mut form = BookForm::for_book(&current);
        edits.apply_to(&mut form);
        let updated = form.validate().map_err(PageError::Invalid)?;

        let patch = BookPatch::diff(&current, &updated);
        if patch.is_empty() {
            tracing::debug!(%id, "edit submitted without changes");
            let detail = render_detail(&current, self.color);
            return Ok(format!("{UNCHANGED_MESSAGE}\n\n{detail}"));
        }

        let saved = self.queries.update_book(id, &patch).await?;
        let detail = self.detail(&saved.id).await?;
        Ok(format!("{UPDATED_MESSAGE}\n\n{detail}"))
    }

    pub async fn delete(&self, id: &BookId) -> Result<String, PageError> {
        self.queries.delete_book(id).await?;
        let dashboard = self.dashboard().await?;
        Ok(format!("{DELETED_MESSAGE}\n\n{dashboard}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bookshelf_http::InMemoryBookApi;
    use bookshelf_query::{QueryClient, QueryOptions};

    use crate::modules::books::form::Field;

    fn setup() -> (Arc<InMemoryBookApi>, BooksPage) {
        let api = Arc::new(InMemoryBookApi::with_sample_books());
        let queries = BookQueries::new(api.clone(), QueryClient::new(QueryOptions::default()));
        (api, BooksPage::new(queries, false))
    }

    fn dune_form() -> BookForm {
        BookForm {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            description: "Spice, sand and politics.".to_string(),
            published_date: "1965-08-01".to_string(),
            genre: "Science Fiction".to_string(),
            pages: Some(412),
            language: "English".to_string(),
            status: "available".to_string(),
        }
    }

    #[tokio::test]
    async fn add_shows_new_book_on_dashboard() {
        let (_, page) = setup();
        page.dashboard().await.unwrap();

        let view = page.add(&dune_form()).await.unwrap();

        assert!(view.starts_with("Book created successfully\n\n"));
        assert!(view.contains("Books (6)"));
        assert!(view.contains("Frank Herbert"));
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_the_api() {
        let (api, page) = setup();
        let form = BookForm {
            title: String::new(),
            ..dune_form()
        };

        let error = page.add(&form).await.unwrap_err();

        match &error {
            PageError::Invalid(errors) => {
                assert_eq!(errors.get(Field::Title), Some("Title is required"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(error.user_message().contains("Title: Title is required"));
        assert_eq!(api.calls().create, 0);
    }

    #[tokio::test]
    async fn edit_sends_only_changed_fields() {
        let (api, page) = setup();
        let id = BookId::from("2");
        let edits = FormEdits {
            status: Some("available".to_string()),
            ..FormEdits::default()
        };

        let view = page.edit(&id, &edits).await.unwrap();

        assert!(view.starts_with("Book updated successfully!\n\n"));
        assert!(view.contains("To Kill a Mockingbird"));
        assert!(view.contains("  Status     available\n"));
        assert_eq!(api.calls().update, 1);
    }

    #[tokio::test]
    async fn edit_without_changes_skips_the_update() {
        let (api, page) = setup();
        let view = page
            .edit(&BookId::from("3"), &FormEdits::default())
            .await
            .unwrap();

        assert!(view.starts_with("No changes to save\n\n1984\n"));
        assert_eq!(api.calls().update, 0);
    }

    #[tokio::test]
    async fn edit_rejects_invalid_overrides() {
        let (api, page) = setup();
        let edits = FormEdits {
            pages: Some(0),
            ..FormEdits::default()
        };

        let error = page.edit(&BookId::from("1"), &edits).await.unwrap_err();

        assert!(error.user_message().contains("Pages must be at least 1"));
        assert_eq!(api.calls().update, 0);
    }

    #[tokio::test]
    async fn delete_returns_to_smaller_dashboard() {
        let (_, page) = setup();
        page.dashboard().await.unwrap();

        let view = page.delete(&BookId::from("5")).await.unwrap();

        assert!(view.starts_with("Book deleted successfully\n\n"));
        assert!(view.contains("Books (4)"));
        assert!(!view.contains("The Hobbit"));
    }

    #[tokio::test]
    async fn missing_book_reads_as_not_found() {
        let (_, page) = setup();
        let error = page.detail(&BookId::from("missing")).await.unwrap_err();
        assert_eq!(error.user_message(), "Book not found");
    }
}
