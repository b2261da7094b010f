use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Context;
use bookshelf_app::modules::books::views::{render_form, render_loading};
use bookshelf_app::modules::books::FormMode;
use bookshelf_app::{BookForm, BooksPage, FormEdits};
use bookshelf_http::{BookApi, HttpBookClient, InMemoryBookApi};
use bookshelf_kernel::settings::Settings;
use bookshelf_kernel::BookId;
use bookshelf_query::{BookQueries, QueryClient, QueryOptions};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about = "Manage a book library from the terminal")]
struct Cli {
    /// Base URL of the book API; overrides configuration.
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Work against a seeded in-memory library instead of the API.
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the dashboard with every book.
    List,
    /// Show one book.
    Show { id: String },
    /// Add a new book.
    Add(AddArgs),
    /// Change fields of an existing book.
    Edit {
        id: String,
        #[command(flatten)]
        fields: EditArgs,
    },
    /// Delete a book.
    Delete { id: String },
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long, default_value = "")]
    title: String,
    #[arg(long, default_value = "")]
    author: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    published_date: String,
    #[arg(long, default_value = "")]
    genre: String,
    #[arg(long, allow_negative_numbers = true)]
    pages: Option<i64>,
    #[arg(long, default_value = "")]
    language: String,
    #[arg(long, default_value = "available")]
    status: String,

    /// Print the filled form without submitting it.
    #[arg(long)]
    preview: bool,
}

impl AddArgs {
    fn to_form(&self) -> BookForm {
        BookForm {
            title: self.title.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
            published_date: self.published_date.clone(),
            genre: self.genre.clone(),
            pages: self.pages,
            language: self.language.clone(),
            status: self.status.clone(),
        }
    }
}

#[derive(Debug, Args)]
struct EditArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    published_date: Option<String>,
    #[arg(long)]
    genre: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pages: Option<i64>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    status: Option<String>,
}

impl From<EditArgs> for FormEdits {
    fn from(args: EditArgs) -> Self {
        Self {
            title: args.title,
            author: args.author,
            description: args.description,
            published_date: args.published_date,
            genre: args.genre,
            pages: args.pages,
            language: args.language,
            status: args.status,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;
    if let Some(url) = &cli.api_url {
        settings.api.base_url.clone_from(url);
    }
    bookshelf_telemetry::init(&settings.telemetry)?;

    let api: Arc<dyn BookApi> = if cli.demo {
        tracing::info!("using the in-memory demo library");
        Arc::new(InMemoryBookApi::with_sample_books())
    } else {
        tracing::info!(api = %settings.api.base_url, "using the remote book API");
        let client = HttpBookClient::from_settings(&settings.api)
            .with_context(|| "failed to build book API client")?;
        Arc::new(client)
    };

    let client = QueryClient::new(QueryOptions::from_settings(&settings.cache));
    let color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let page = BooksPage::new(BookQueries::new(api, client), color);

    let outcome = match cli.command {
        Command::List => {
            loading("Loading books...");
            page.dashboard().await
        }
        Command::Show { id } => {
            loading("Loading book...");
            page.detail(&BookId::new(id)).await
        }
        Command::Add(args) if args.preview => Ok(render_form(FormMode::Add, None, &args.to_form())),
        Command::Add(args) => page.add(&args.to_form()).await,
        Command::Edit { id, fields } => page.edit(&BookId::new(id), &fields.into()).await,
        Command::Delete { id } => page.delete(&BookId::new(id)).await,
    };

    match outcome {
        Ok(view) => {
            print!("{view}");
            Ok(())
        }
        Err(error) => {
            eprint!("{}", with_newline(error.user_message()));
            tracing::debug!(%error, "command failed");
            std::process::exit(1);
        }
    }
}

fn loading(text: &str) {
    if std::io::stderr().is_terminal() {
        eprint!("{}", render_loading(text));
    }
}

fn with_newline(mut message: String) -> String {
    if !message.ends_with('\n') {
        message.push('\n');
    }
    message
}
