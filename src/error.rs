//! Error types and handling for Fulmen
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Fulmen operations
pub type Result<T> = std::result::Result<T, FulmenError>;

/// Main error type for Fulmen
#[derive(Debug, Error)]
pub enum FulmenError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Authentication/authorization errors (missing or invalid token)
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// HTTP 4xx responses from the provider (credential-invalidating)
    #[error("HTTP client error {status}: {message}")]
    HttpClient { status: u16, message: String },

    /// HTTP 5xx responses from the provider (transient)
    #[error("HTTP server error {status}: {message}")]
    HttpServer { status: u16, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Unexpected payload shape or date format
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Missing `data` envelope or otherwise unusable response
    #[error("Value error: {message}")]
    Value { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl FulmenError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        FulmenError::Config {
            message: message.into(),
        }
    }

    /// Create a new auth error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        FulmenError::Auth {
            message: message.into(),
        }
    }

    /// Create a new HTTP client (4xx) error
    pub fn http_client<S: Into<String>>(status: u16, message: S) -> Self {
        FulmenError::HttpClient {
            status,
            message: message.into(),
        }
    }

    /// Create a new HTTP server (5xx) error
    pub fn http_server<S: Into<String>>(status: u16, message: S) -> Self {
        FulmenError::HttpServer {
            status,
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        FulmenError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        FulmenError::Parse {
            message: message.into(),
        }
    }

    /// Create a new value error
    pub fn value<S: Into<String>>(message: S) -> Self {
        FulmenError::Value {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        FulmenError::Network {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        FulmenError::Io {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        FulmenError::Generic {
            message: message.into(),
        }
    }

    /// Whether this error is an HTTP 4xx-class failure
    pub fn is_client_error(&self) -> bool {
        matches!(self, FulmenError::HttpClient { .. })
    }
}

impl From<std::io::Error> for FulmenError {
    fn from(err: std::io::Error) -> Self {
        FulmenError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for FulmenError {
    fn from(err: serde_yaml::Error) -> Self {
        FulmenError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for FulmenError {
    fn from(err: serde_json::Error) -> Self {
        FulmenError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for FulmenError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FulmenError::timeout(err.to_string())
        } else {
            FulmenError::network(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for FulmenError {
    fn from(err: chrono::ParseError) -> Self {
        FulmenError::parse(err.to_string())
    }
}
