//! Error types for the fare crawler
//!
//! This module defines the domain errors raised by the API client, the
//! response parser and the configuration layer.

use thiserror::Error;

/// Errors that can occur while talking to the provider API
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP transport error (connection refused, reset, DNS, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Non-success HTTP status
    #[error("Server returned status {status}: {body}")]
    ServerError { status: u16, body: String },

    /// Provider reported a business error in `head.code`
    #[error("Provider error code={code}: {message}")]
    Api { code: i64, message: String },

    /// Response body was not valid JSON or lacked the `data` field;
    /// classified as a parse failure
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No endpoint configured for the request
    #[error("Endpoint URL is not configured")]
    MissingEndpoint,
}

impl FetchError {
    /// Whether the failure happened below the HTTP layer
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_status() && !e.is_decode(),
            Self::Timeout => true,
            _ => false,
        }
    }
}

/// Errors that can occur while parsing provider responses
#[derive(Error, Debug)]
pub enum ParseError {
    /// `data` field missing or not an array
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Date string in an unknown format
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Flight item without any usable segment
    #[error("Flight item has no segments")]
    NoSegments,

    /// Numeric field could not be read
    #[error("Invalid number in field '{field}'")]
    InvalidNumber { field: String },
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    /// Config file is not valid TOML for the expected schema
    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },

    /// A field holds an invalid value
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// A required option is missing
    #[error("Missing required option '{0}'")]
    Missing(String),
}

impl ConfigError {
    /// Create an invalid-value error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
