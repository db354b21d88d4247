// src/error.rs

//! Unified error handling for the relay.

use std::fmt;

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// AWS S3 error
    #[error("S3 error: {0}")]
    S3(String),

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

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A source could not be fetched or its payload could not be parsed
    #[error("Fetch error for {source_name}: {message}")]
    Fetch {
        source_name: String,
        message: String,
    },

    /// The Telegram Bot API rejected a call or returned no message
    #[error("Telegram {method} failed: {description}")]
    Telegram { method: String, description: String },

    /// No collaborator is registered under the configured source name
    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

impl AppError {
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

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for a source.
    pub fn fetch(source_name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Create a messaging error for a Bot API method.
    pub fn telegram(method: impl Into<String>, description: impl fmt::Display) -> Self {
        Self::Telegram {
            method: method.into(),
            description: description.to_string(),
        }
    }
}
