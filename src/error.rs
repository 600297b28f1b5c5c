// src/error.rs

//! Unified error handling for the class checker.

use std::fmt;

use thiserror::Error;

/// Result type alias for class checker operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Status store read or write failed
    #[error("Store error: {0}")]
    Store(String),

    /// Access token could not be obtained
    #[error("Token error: {0}")]
    Token(String),

    /// Notification could not be delivered
    #[error("Notify error for {recipient}: {message}")]
    Notify { recipient: String, message: String },

    /// Catalog query failed for a section
    #[error("Catalog query failed: {0}")]
    Query(#[from] QueryError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a store error.
    pub fn store(message: impl fmt::Display) -> Self {
        Self::Store(message.to_string())
    }

    /// Create a token error.
    pub fn token(message: impl fmt::Display) -> Self {
        Self::Token(message.to_string())
    }

    /// Create a notification error for a recipient.
    pub fn notify(recipient: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Notify {
            recipient: recipient.into(),
            message: message.to_string(),
        }
    }
}

/// Failure of a single catalog query (fetch + parse).
///
/// These never abort a pass; they are recorded against the section that
/// produced them and the section's stored status is left alone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Transport failure talking to the catalog, including timeouts.
    #[error("catalog unreachable: {0}")]
    Unreachable(String),

    /// Section absent from the catalog response.
    #[error("section not found: {0}")]
    NotFound(String),

    /// Response did not match the expected schema or markup.
    #[error("unparseable response: {0}")]
    Unparseable(String),
}

impl QueryError {
    /// Stable name of the failure kind, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Unreachable(_) => "unreachable",
            QueryError::NotFound(_) => "not_found",
            QueryError::Unparseable(_) => "unparseable",
        }
    }

    pub fn unreachable(message: impl fmt::Display) -> Self {
        Self::Unreachable(message.to_string())
    }

    pub fn not_found(message: impl fmt::Display) -> Self {
        Self::NotFound(message.to_string())
    }

    pub fn unparseable(message: impl fmt::Display) -> Self {
        Self::Unparseable(message.to_string())
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(error: reqwest::Error) -> Self {
        QueryError::Unreachable(error.to_string())
    }
}
