//! Book form input and its validation schema.
//!
//! Validation runs before anything is sent: a form with any failing field
//! never produces a payload.

use std::fmt;

use bookshelf_kernel::{Book, BookStatus, NewBook};

const TITLE_MAX: usize = 50;
const AUTHOR_MAX: usize = 30;
const DESCRIPTION_MAX: usize = 700;
const GENRE_MAX: usize = 30;
const LANGUAGE_MAX: usize = 30;
const PAGES_MIN: i64 = 1;
const PAGES_MAX: i64 = 10_000;

/// Form fields in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Author,
    Genre,
    Language,
    PublishedDate,
    Pages,
    Status,
    Description,
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Author => "Author",
            Self::Genre => "Genre",
            Self::Language => "Language",
            Self::PublishedDate => "Published Date",
            Self::Pages => "Pages",
            Self::Status => "Status",
            Self::Description => "Description",
        }
    }

    /// Name used on the wire and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
            Self::Genre => "genre",
            Self::Language => "language",
            Self::PublishedDate => "publishedDate",
            Self::Pages => "pages",
            Self::Status => "status",
            Self::Description => "description",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// Every failing field with the message of its first broken rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    errors: Vec<FieldError>,
}

impl FormErrors {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for FormErrors {}

/// Whether the form creates a new book or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Edit,
}

impl FormMode {
    pub fn heading(self, book: Option<&Book>) -> String {
        match self {
            Self::Add => "Add New Book".to_string(),
            Self::Edit => format!(
                "Edit Book: {}",
                book.map(|book| book.title.as_str()).unwrap_or_default()
            ),
        }
    }

    pub fn submit_label(self) -> &'static str {
        match self {
            Self::Add => "Add Book",
            Self::Edit => "Save Changes",
        }
    }
}

/// Raw user input, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookForm {
    pub title: String,
    pub author: String,
    pub description: String,
    pub published_date: String,
    pub genre: String,
    pub pages: Option<i64>,
    pub language: String,
    pub status: String,
}

impl Default for BookForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            description: String::new(),
            published_date: String::new(),
            genre: String::new(),
            pages: None,
            language: String::new(),
            status: BookStatus::default().as_str().to_string(),
        }
    }
}

impl BookForm {
    /// Form prefilled for editing `book`.
    pub fn for_book(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            author: book.author.clone(),
            description: book.description.clone(),
            published_date: book.published_date.clone(),
            genre: book.genre.clone(),
            pages: Some(i64::from(book.pages)),
            language: book.language.clone(),
            status: book.status.as_str().to_string(),
        }
    }

    pub fn validate(&self) -> Result<NewBook, FormErrors> {
        let mut errors = FormErrors::default();

        check_text(&mut errors, Field::Title, &self.title, Some(TITLE_MAX));
        check_text(&mut errors, Field::Author, &self.author, Some(AUTHOR_MAX));
        check_text(&mut errors, Field::Genre, &self.genre, Some(GENRE_MAX));
        check_text(&mut errors, Field::Language, &self.language, Some(LANGUAGE_MAX));
        check_text(&mut errors, Field::PublishedDate, &self.published_date, None);
        let pages = check_pages(&mut errors, self.pages);
        let status = match self.status.parse::<BookStatus>() {
            Ok(status) => Some(status),
            Err(error) => {
                errors.push(Field::Status, error.to_string());
                None
            }
        };
        check_text(
            &mut errors,
            Field::Description,
            &self.description,
            Some(DESCRIPTION_MAX),
        );

        match (pages, status) {
            (Some(pages), Some(status)) if errors.is_empty() => Ok(NewBook {
                title: self.title.clone(),
                author: self.author.clone(),
                description: self.description.clone(),
                published_date: self.published_date.clone(),
                genre: self.genre.clone(),
                pages,
                language: self.language.clone(),
                status,
            }),
            _ => Err(errors),
        }
    }
}

/// Field overrides typed by the user on top of an existing form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormEdits {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub published_date: Option<String>,
    pub genre: Option<String>,
    pub pages: Option<i64>,
    pub language: Option<String>,
    pub status: Option<String>,
}

impl FormEdits {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, form: &mut BookForm) {
        let text_fields = [
            (&self.title, &mut form.title),
            (&self.author, &mut form.author),
            (&self.description, &mut form.description),
            (&self.published_date, &mut form.published_date),
            (&self.genre, &mut form.genre),
            (&self.language, &mut form.language),
            (&self.status, &mut form.status),
        ];
        for (edit, target) in text_fields {
            if let Some(value) = edit {
                target.clone_from(value);
            }
        }
        if self.pages.is_some() {
            form.pages = self.pages;
        }
    }
}

/// Required check plus an optional maximum length. Length counts Unicode
/// scalar values, so characters outside the Basic Multilingual Plane count
/// once each where a UTF-16 length would count them twice.
fn check_text(errors: &mut FormErrors, field: Field, value: &str, max: Option<usize>) {
    let length = value.chars().count();
    if length == 0 {
        errors.push(field, required_message(field));
        return;
    }
    if let Some(max) = max {
        if length > max {
            errors.push(
                field,
                format!("{} must be less than {max} characters", field.label()),
            );
        }
    }
}

fn required_message(field: Field) -> String {
    match field {
        Field::PublishedDate => "Published date is required".to_string(),
        other => format!("{} is required", other.label()),
    }
}

fn check_pages(errors: &mut FormErrors, pages: Option<i64>) -> Option<u32> {
    match pages {
        None => {
            errors.push(Field::Pages, "Pages is required");
            None
        }
        Some(pages) if pages < PAGES_MIN => {
            errors.push(Field::Pages, format!("Pages must be at least {PAGES_MIN}"));
            None
        }
        Some(pages) if pages > PAGES_MAX => {
            errors.push(Field::Pages, format!("Pages must be less than {PAGES_MAX}"));
            None
        }
        Some(pages) => u32::try_from(pages).ok(),
    }
}
