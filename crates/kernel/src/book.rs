use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier assigned to a book by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty or whitespace-only id never names a stored book.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BookId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for BookId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for BookId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lending state of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Available,
    Borrowed,
    Reserved,
}

impl BookStatus {
    pub const ALL: [BookStatus; 3] = [Self::Available, Self::Borrowed, Self::Reserved];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Borrowed => "borrowed",
            Self::Reserved => "reserved",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid enum value. Expected 'available' | 'borrowed' | 'reserved', received '{received}'")]
pub struct ParseStatusError {
    pub received: String,
}

impl FromStr for BookStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError {
                received: s.to_string(),
            })
    }
}

/// A book record as served by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub description: String,
    pub published_date: String,
    pub genre: String,
    pub pages: u32,
    pub language: String,
    pub status: BookStatus,
}

impl Book {
    /// Every field except the server-assigned id.
    pub fn to_new(&self) -> NewBook {
        NewBook {
            title: self.title.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
            published_date: self.published_date.clone(),
            genre: self.genre.clone(),
            pages: self.pages,
            language: self.language.clone(),
            status: self.status,
        }
    }
}

/// Payload for creating a book; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: String,
    pub published_date: String,
    pub genre: String,
    pub pages: u32,
    pub language: String,
    pub status: BookStatus,
}

impl NewBook {
    pub fn with_id(self, id: BookId) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            description: self.description,
            published_date: self.published_date,
            genre: self.genre,
            pages: self.pages,
            language: self.language,
            status: self.status,
        }
    }
}

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BookStatus>,
}

impl BookPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite the fields present in the patch. The id is never touched.
    pub fn apply(&self, book: &mut Book) {
        if let Some(title) = &self.title {
            book.title.clone_from(title);
        }
        if let Some(author) = &self.author {
            book.author.clone_from(author);
        }
        if let Some(description) = &self.description {
            book.description.clone_from(description);
        }
        if let Some(published_date) = &self.published_date {
            book.published_date.clone_from(published_date);
        }
        if let Some(genre) = &self.genre {
            book.genre.clone_from(genre);
        }
        if let Some(pages) = self.pages {
            book.pages = pages;
        }
        if let Some(language) = &self.language {
            book.language.clone_from(language);
        }
        if let Some(status) = self.status {
            book.status = status;
        }
    }

    /// Patch holding only the fields where `updated` differs from `current`.
    pub fn diff(current: &Book, updated: &NewBook) -> Self {
        fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
            (old != new).then(|| new.clone())
        }

        Self {
            title: changed(&current.title, &updated.title),
            author: changed(&current.author, &updated.author),
            description: changed(&current.description, &updated.description),
            published_date: changed(&current.published_date, &updated.published_date),
            genre: changed(&current.genre, &updated.genre),
            pages: changed(&current.pages, &updated.pages),
            language: changed(&current.language, &updated.language),
            status: changed(&current.status, &updated.status),
        }
    }
}

impl From<NewBook> for BookPatch {
    fn from(book: NewBook) -> Self {
        Self {
            title: Some(book.title),
            author: Some(book.author),
            description: Some(book.description),
            published_date: Some(book.published_date),
            genre: Some(book.genre),
            pages: Some(book.pages),
            language: Some(book.language),
            status: Some(book.status),
        }
    }
}
