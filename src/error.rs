// src/error.rs

//! Unified error handling for the bulletin monitor.

use std::fmt;

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Download failed after all retries
    #[error("Failed to download {url} after {attempts} attempts: {message}")]
    Fetch {
        url: String,
        attempts: u32,
        message: String,
    },

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

    /// Missing required environment variables
    #[error("Missing environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Listing scrape error
    #[error("Scrape error for {context}: {message}")]
    Scrape { context: String, message: String },

    /// Listing guard tripped
    #[error("Listing guard triggered: {0}")]
    Guard(String),

    /// Email composition or delivery failed
    #[error("Notification error: {0}")]
    Notify(String),
}

impl AppError {
    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
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

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a scrape error with context.
    pub fn scrape(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Scrape {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a notification error.
    pub fn notify(message: impl fmt::Display) -> Self {
        Self::Notify(message.to_string())
    }

    /// Whether the error text is safe and useful to return to the invoker.
    ///
    /// Internal failures (storage, I/O, serialization) are reported with a
    /// generic message and only logged in full.
    pub fn is_domain_error(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Fetch { .. }
                | Self::Url(_)
                | Self::Selector { .. }
                | Self::Config(_)
                | Self::MissingEnv(_)
                | Self::Validation(_)
                | Self::Scrape { .. }
                | Self::Guard(_)
                | Self::Notify(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_lists_all_names() {
        let err = AppError::MissingEnv(vec!["S3_BUCKET".into(), "EMAIL_SENDER".into()]);
        assert_eq!(
            err.to_string(),
            "Missing environment variables: S3_BUCKET, EMAIL_SENDER"
        );
    }

    #[test]
    fn test_domain_error_classification() {
        assert!(AppError::notify("smtp down").is_domain_error());
        assert!(AppError::config("bad").is_domain_error());
        assert!(!AppError::storage("denied").is_domain_error());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert!(!AppError::from(io).is_domain_error());
    }
}
