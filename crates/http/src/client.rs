//! Reqwest-backed book API adapter.
//!
//! Owns transport details only: URL construction, JSON bodies, status
//! mapping and decoding into kernel types.

use std::time::Duration;

use async_trait::async_trait;
use bookshelf_kernel::settings::ApiSettings;
use bookshelf_kernel::{Book, BookId, BookPatch, NewBook};
use reqwest::{header, Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::{ApiError, BookApi};

const BOOKS_SEGMENT: &str = "books";

/// Book API client that issues one HTTP request per operation.
#[derive(Debug, Clone)]
pub struct HttpBookClient {
    client: Client,
    base_url: Url,
}

impl HttpBookClient {
    /// Build a client for `base_url` (for example `http://localhost:8080/api`).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] when the URL cannot carry path segments or
    /// the reqwest client cannot be constructed.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        if base_url.cannot_be_a_base() {
            return Err(ApiError::config(format!(
                "base URL '{base_url}' cannot carry a path"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ApiError::config(error.to_string()))?;
        Ok(Self { client, base_url })
    }

    /// Build a client from the `[api]` settings section.
    pub fn from_settings(settings: &ApiSettings) -> Result<Self, ApiError> {
        let base_url = Url::parse(&settings.base_url).map_err(|error| {
            ApiError::config(format!("invalid base URL '{}': {error}", settings.base_url))
        })?;
        Self::new(base_url, settings.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append percent-encoded segments to the base path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                ApiError::config(format!("base URL '{}' cannot carry a path", self.base_url))
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(header::ACCEPT, "application/json")
    }

    /// Send the request and return the raw body of a successful response.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        request: RequestBuilder,
    ) -> Result<Vec<u8>, ApiError> {
        tracing::debug!(%method, %url, "sending book API request");

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;

        if !status.is_success() {
            let error = ApiError::from_status(status, &String::from_utf8_lossy(&body));
            tracing::warn!(
                %method,
                %url,
                status = status.as_u16(),
                error_code = error.code(),
                "book API request failed"
            );
            return Err(error);
        }

        tracing::debug!(
            %method,
            %url,
            status = status.as_u16(),
            bytes = body.len(),
            "book API request succeeded"
        );
        Ok(body.to_vec())
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.execute(method, url, request).await?;
        decode(&body)
    }
}

#[async_trait]
impl BookApi for HttpBookClient {
    async fn list_books(&self) -> Result<Vec<Book>, ApiError> {
        let url = self.endpoint(&[BOOKS_SEGMENT])?;
        let request = self.request(Method::GET, url.clone());
        self.execute_json(Method::GET, url, request).await
    }

    async fn get_book(&self, id: &BookId) -> Result<Book, ApiError> {
        let url = self.endpoint(&[BOOKS_SEGMENT, id.as_str()])?;
        let request = self.request(Method::GET, url.clone());
        self.execute_json(Method::GET, url, request)
            .await
            .map_err(|error| error.for_book(id.as_str()))
    }

    async fn create_book(&self, book: &NewBook) -> Result<Book, ApiError> {
        let url = self.endpoint(&[BOOKS_SEGMENT])?;
        let request = self.request(Method::POST, url.clone()).json(book);
        self.execute_json(Method::POST, url, request).await
    }

    async fn update_book(&self, id: &BookId, patch: &BookPatch) -> Result<Book, ApiError> {
        let url = self.endpoint(&[BOOKS_SEGMENT, id.as_str()])?;
        let request = self.request(Method::PUT, url.clone()).json(patch);
        self.execute_json(Method::PUT, url, request)
            .await
            .map_err(|error| error.for_book(id.as_str()))
    }

    async fn delete_book(&self, id: &BookId) -> Result<(), ApiError> {
        let url = self.endpoint(&[BOOKS_SEGMENT, id.as_str()])?;
        let request = self.request(Method::DELETE, url.clone());
        self.execute(Method::DELETE, url, request)
            .await
            .map(|_| ())
            .map_err(|error| error.for_book(id.as_str()))
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|error| ApiError::decode(format!("invalid book payload: {error}")))
}

fn map_transport_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        return ApiError::network(format!("request timed out: {error}"));
    }
    if let Some(status) = error.status() {
        return ApiError::from_status(status, "");
    }
    ApiError::from(error)
}
