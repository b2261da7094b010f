use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Context;
use bookshelf_app::BooksPage;
use bookshelf_http::HttpBookClient;
use bookshelf_kernel::settings::Settings;
use bookshelf_query::{BookQueries, QueryClient, QueryOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;
    bookshelf_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        api = %settings.api.base_url,
        "bookshelf-app starting"
    );

    let api = HttpBookClient::from_settings(&settings.api)
        .with_context(|| "failed to build book API client")?;
    let client = QueryClient::new(QueryOptions::from_settings(&settings.cache));
    let page = BooksPage::new(
        BookQueries::new(Arc::new(api), client),
        std::io::stdout().is_terminal(),
    );

    match page.dashboard().await {
        Ok(view) => {
            print!("{view}");
            Ok(())
        }
        Err(error) => {
            eprintln!("{}", error.user_message().trim_end());
            tracing::debug!(%error, "dashboard failed");
            std::process::exit(1);
        }
    }
}
