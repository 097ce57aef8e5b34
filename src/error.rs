// src/error.rs

//! Unified error handling for the sync engine.

use std::fmt;

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Login failed or the portal answered with an unrecognized challenge
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transient transport failure that survived all retries
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// The portal signaled throttling and retries were exhausted
    #[error("Rate limited by portal at {url}")]
    RateLimited { url: String },

    /// The portal no longer accepts the current session
    #[error("Session challenged while fetching {url}")]
    AuthChallenge { url: String },

    /// A page did not have the structure expected for its kind
    #[error("Parse error on {kind} page {url}: {message}")]
    Parse {
        kind: &'static str,
        url: String,
        message: String,
    },

    /// An entity identifier is not present in the current snapshot
    #[error("Unknown entity: {0}")]
    NotFound(String),

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

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Crawling error
    #[error("Crawl error for {context}: {message}")]
    Crawl { context: String, message: String },
}

impl AppError {
    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a network error for a URL.
    pub fn network(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error with page kind and URL context.
    pub fn parse(kind: &'static str, url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            kind,
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a crawl error with context.
    pub fn crawl(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error signals an invalid session rather than a hard failure.
    pub fn is_auth_challenge(&self) -> bool {
        matches!(self, Self::AuthChallenge { .. })
    }
}
