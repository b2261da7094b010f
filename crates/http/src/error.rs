//! Error handling for the Bookshelf remote data client

use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by a [`crate::BookApi`] call.
///
/// Variants carry rendered messages rather than source errors so one failure
/// can be shared by every caller waiting on the same query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response body: {message}")]
    Decode { message: String },

    #[error("invalid client configuration: {message}")]
    Config { message: String },
}

impl ApiError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an error for any other non-success status
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Map a non-success response to an error. Blank bodies fall back to the
    /// canonical reason phrase.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unexpected response")
                .to_string()
        } else {
            body.to_string()
        };

        if status == StatusCode::NOT_FOUND {
            Self::not_found(message)
        } else {
            Self::status(status.as_u16(), message)
        }
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network_error",
            Self::NotFound { .. } => "not_found",
            Self::Status { .. } => "http_error",
            Self::Decode { .. } => "decode_error",
            Self::Config { .. } => "config_error",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Name the book a not-found error refers to. Other kinds pass through.
    pub fn for_book(self, id: &str) -> Self {
        match self {
            Self::NotFound { message } => Self::not_found(format!("book {id}: {message}")),
            other => other,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::decode(error.to_string())
        } else if error.is_builder() {
            Self::config(error.to_string())
        } else {
            Self::network(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_book() {
        let error =
            ApiError::from_status(StatusCode::NOT_FOUND, "Book not found").for_book("42");
        assert_eq!(error, ApiError::not_found("book 42: Book not found"));
        assert_eq!(error.to_string(), "book 42: Book not found");

        let other = ApiError::status(500, "boom").for_book("42");
        assert_eq!(other, ApiError::status(500, "boom"));
    }

    #[test]
    fn not_found_status_maps_to_not_found() {
        let error = ApiError::from_status(StatusCode::NOT_FOUND, "Book not found\n");
        assert!(error.is_not_found());
        assert_eq!(error.to_string(), "Book not found");
        assert_eq!(error.code(), "not_found");
    }

    #[test]
    fn other_statuses_keep_code_and_body() {
        let error = ApiError::from_status(StatusCode::BAD_REQUEST, "all fields are required");
        match error {
            ApiError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "all fields are required");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[test]
    fn blank_body_uses_reason_phrase() {
        let error = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "  ");
        assert_eq!(
            error,
            ApiError::status(500, "Internal Server Error"),
        );
        assert_eq!(error.code(), "http_error");
    }
}
