//! Plain-text views of books for a terminal.

use bookshelf_kernel::{Book, BookStatus};
use bookshelf_query::QueryError;

use crate::modules::books::form::{BookForm, Field, FormErrors, FormMode};
use crate::utils::{published_year, truncate};

const TITLE_WIDTH: usize = 40;
const TEXT_WIDTH: usize = 24;
const DETAIL_LABEL_WIDTH: usize = 11;

/// Colour family of a badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Green,
    Yellow,
    Blue,
}

impl Tone {
    fn ansi(self) -> &'static str {
        match self {
            Self::Green => "32",
            Self::Yellow => "33",
            Self::Blue => "34",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBadge {
    status: BookStatus,
}

impl StatusBadge {
    pub fn new(status: BookStatus) -> Self {
        Self { status }
    }

    pub fn tone(&self) -> Tone {
        match self.status {
            BookStatus::Available => Tone::Green,
            BookStatus::Borrowed => Tone::Yellow,
            BookStatus::Reserved => Tone::Blue,
        }
    }

    pub fn label(&self) -> &'static str {
        self.status.as_str()
    }

    pub fn render(&self, color: bool) -> String {
        if color {
            format!("\x1b[{}m{}\x1b[0m", self.tone().ansi(), self.label())
        } else {
            self.label().to_string()
        }
    }
}

fn year_or_raw(date: &str) -> String {
    published_year(date).map_or_else(|| date.to_string(), |year| year.to_string())
}

/// Library overview: heading, count and one row per book.
pub fn render_dashboard(books: &[Book], color: bool) -> String {
    let mut lines = vec![
        "Books Library".to_string(),
        String::new(),
        format!("Books ({})", books.len()),
    ];

    if books.is_empty() {
        lines.push("No books yet.".to_string());
        return finish(lines);
    }

    let rows: Vec<[String; 6]> = books
        .iter()
        .map(|book| {
            [
                book.id.to_string(),
                truncate(&book.title, TITLE_WIDTH),
                truncate(&book.author, TEXT_WIDTH),
                truncate(&book.genre, TEXT_WIDTH),
                book.pages.to_string(),
                year_or_raw(&book.published_date),
            ]
        })
        .collect();

    let headers = ["ID", "Title", "Author", "Genre", "Pages", "Published"];
    let mut widths = headers.map(|header| header.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    lines.push(format!("{}Status", padded_row(&headers, &widths)));
    let rule_length = widths.iter().map(|width| width + 2).sum::<usize>() + "Status".len();
    lines.push("-".repeat(rule_length));
    lines.extend(rows.iter().zip(books).map(|(row, book)| {
        format!(
            "{}{}",
            padded_row(row, &widths),
            StatusBadge::new(book.status).render(color)
        )
    }));
    finish(lines)
}

fn padded_row<S: AsRef<str>>(cells: &[S], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let cell = cell.as_ref();
            let padding = width.saturating_sub(cell.chars().count()) + 2;
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect()
}

/// Joins lines with a trailing newline.
fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Full record: title, detail block and description.
pub fn render_detail(book: &Book, color: bool) -> String {
    let mut lines = vec![
        book.title.clone(),
        format!("(id: {})", book.id),
        String::new(),
        "Book details".to_string(),
    ];

    let details = [
        ("Author", book.author.clone()),
        ("Genre", book.genre.clone()),
        ("Pages", book.pages.to_string()),
        ("Language", book.language.clone()),
        ("Published", year_or_raw(&book.published_date)),
        ("Status", StatusBadge::new(book.status).render(color)),
    ];
    lines.extend(
        details
            .into_iter()
            .map(|(label, value)| format!("  {label:<width$}{value}", width = DETAIL_LABEL_WIDTH)),
    );

    lines.push(String::new());
    lines.push("Description".to_string());
    lines.push(format!("  {}", book.description));
    finish(lines)
}

/// The form as it will be submitted.
pub fn render_form(mode: FormMode, book: Option<&Book>, form: &BookForm) -> String {
    let pages = form.pages.map(|pages| pages.to_string()).unwrap_or_default();
    let fields = [
        (Field::Title, form.title.as_str()),
        (Field::Author, form.author.as_str()),
        (Field::Genre, form.genre.as_str()),
        (Field::Language, form.language.as_str()),
        (Field::PublishedDate, form.published_date.as_str()),
        (Field::Pages, pages.as_str()),
        (Field::Status, form.status.as_str()),
        (Field::Description, form.description.as_str()),
    ];

    let mut lines = vec![mode.heading(book)];
    lines.extend(
        fields
            .into_iter()
            .map(|(field, value)| format!("  {:<16}{value}", field.label())),
    );
    lines.push(format!("[{}]", mode.submit_label()));
    finish(lines)
}

/// Field errors, one per line, in form order.
pub fn render_form_errors(errors: &FormErrors) -> String {
    let mut lines = vec!["Please fix the following fields:".to_string()];
    lines.extend(
        errors
            .iter()
            .map(|error| format!("  {}: {}", error.field.label(), error.message)),
    );
    finish(lines)
}

pub fn render_loading(text: &str) -> String {
    format!("{text}\n")
}

/// User-facing message for a failed query or mutation.
pub fn render_query_error(error: &QueryError) -> String {
    if error.is_not_found() {
        return "Book not found".to_string();
    }
    match error {
        QueryError::Disabled { .. } => "No book selected".to_string(),
        other => format!("Something went wrong: {other}"),
    }
}
