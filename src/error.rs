//! Error types for the newsletter engine.

use std::time::Duration;

/// Top-level error type for public operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl Error {
    /// Stable label used in structured error results.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Transport(_) => "transport",
            Self::Validation(_) => "validation",
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid topic keyword {keyword:?}: {reason}")]
    InvalidKeyword { keyword: String, reason: String },
}

/// A collaborator (chat platform, mail server, document store) was unreachable or
/// rejected the request.
///
/// Always scoped to one operation or one channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{service} unreachable: {reason}")]
    Unreachable { service: String, reason: String },

    #[error("Authentication failed for {service}")]
    AuthFailed { service: String },

    #[error("{service} rate limited, retry after {retry_after:?}")]
    RateLimited {
        service: String,
        retry_after: Option<Duration>,
    },

    #[error("{service} resource not found: {resource}")]
    NotFound { service: String, resource: String },

    #[error("{service} API error: {code}")]
    Api { service: String, code: String },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("Failed to send via {service}: {reason}")]
    SendFailed { service: String, reason: String },

    #[error("Failed to publish to {service}: {reason}")]
    PublishFailed { service: String, reason: String },
}

/// Malformed input to a public operation. Raised before any side effect.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("days_back must be a positive integer, got {0}")]
    NonPositiveDaysBack(i64),

    #[error("days_back is out of range: {0}")]
    DaysBackOutOfRange(i64),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
