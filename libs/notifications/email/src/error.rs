//! Error types for the notification library.

use std::fmt;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur when sending notifications.
#[derive(Debug)]
pub enum NotificationError {
    /// Serialization/deserialization error
    SerializationError(String),
    /// Configuration error
    ConfigError(String),
    /// Invalid input
    InvalidInput(String),
    /// Template rendering error
    TemplateError(String),
    /// Provider error (SMTP, etc.)
    ProviderError(String),
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::TemplateError(msg) => write!(f, "Template error: {}", msg),
            Self::ProviderError(msg) => write!(f, "Provider error: {}", msg),
        }
    }
}

impl std::error::Error for NotificationError {}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<eyre::Report> for NotificationError {
    fn from(err: eyre::Report) -> Self {
        Self::ProviderError(err.to_string())
    }
}
