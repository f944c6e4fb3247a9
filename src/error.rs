//! Unified error handling for the farecrawl crate
//!
//! This module consolidates the domain-specific errors into a single `Error`
//! enum and classifies every variant into an [`ErrorKind`], which is what the
//! scheduler uses to decide whether a failed task is retried.
//!
//! # Architecture
//!
//! - [`CrawlErrorTrait`] - Common interface implemented by the error types
//! - [`ErrorKind`] - Classification driving the retry policy
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use farecrawl::error::{CrawlErrorTrait, Error, ErrorKind};
//!
//! fn handle_error(err: Error) {
//!     match err.kind() {
//!         ErrorKind::Configuration => eprintln!("Fatal error: {}", err),
//!         kind => println!("Retrying {:?} failure: {}", kind, err),
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::scheduler::error::SchedulerError;
pub use crate::utils::error::{ConfigError, FetchError, ParseError};

/// Common trait for farecrawl error types
pub trait CrawlErrorTrait: std::error::Error {
    /// Check if this error may succeed on a later attempt
    fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Configuration
    }

    /// Classification used by the retry policy
    fn kind(&self) -> ErrorKind;
}

/// Classification of errors for retry handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection failures and timeouts from the API client
    Network,
    /// Non-success status or provider-reported error payload
    Api,
    /// Response shape unexpected
    Parse,
    /// Missing or invalid configuration, never retried
    Configuration,
}

impl ErrorKind {
    /// Short lowercase name used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Api => "api",
            Self::Parse => "parse",
            Self::Configuration => "configuration",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the farecrawl crate
#[derive(Error, Debug)]
pub enum Error {
    /// Provider API errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Response parsing errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors outside the provider API (calendar, remote storage)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl CrawlErrorTrait for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(e) => e.kind(),
            Self::Parse(_) | Self::Json(_) => ErrorKind::Parse,
            Self::Scheduler(e) if e.is_configuration() => ErrorKind::Configuration,
            Self::Config(_) => ErrorKind::Configuration,
            Self::Http(e) if e.is_timeout() || e.is_connect() => ErrorKind::Network,
            // Unclassified failures are retried like API errors so no task is lost
            Self::Scheduler(_) | Self::Io(_) | Self::Http(_) | Self::Other { .. } => ErrorKind::Api,
        }
    }
}

impl CrawlErrorTrait for FetchError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingEndpoint => ErrorKind::Configuration,
            Self::InvalidResponse(_) => ErrorKind::Parse,
            e if e.is_transport() => ErrorKind::Network,
            _ => ErrorKind::Api,
        }
    }
}

impl CrawlErrorTrait for ParseError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Parse
    }
}

impl Error {
    /// Create a configuration error for a missing option
    pub fn config(option: impl Into<String>) -> Self {
        Self::Config(ConfigError::Missing(option.into()))
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        let fetch_err = Error::Fetch(FetchError::Timeout);
        assert_eq!(fetch_err.kind(), ErrorKind::Network);

        let api_err = Error::Fetch(FetchError::Api {
            code: 1,
            message: "busy".to_string(),
        });
        assert_eq!(api_err.kind(), ErrorKind::Api);

        let parse_err = Error::Parse(ParseError::NoSegments);
        assert_eq!(parse_err.kind(), ErrorKind::Parse);

        let server_err = Error::Fetch(FetchError::ServerError {
            status: 502,
            body: String::new(),
        });
        assert_eq!(server_err.kind(), ErrorKind::Api);
    }

    #[test]
    fn test_malformed_response_is_parse() {
        let err = Error::Fetch(FetchError::InvalidResponse("missing data".to_string()));
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::Fetch(FetchError::Timeout).is_recoverable());
        assert!(Error::Parse(ParseError::NoSegments).is_recoverable());
        assert!(!Error::config("api.endpoint_url").is_recoverable());
        assert!(!Error::Fetch(FetchError::MissingEndpoint).is_recoverable());
    }

    #[test]
    fn test_unclassified_is_api() {
        let err = Error::other("Something went wrong");
        assert_eq!(err.kind(), ErrorKind::Api);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_missing_executor_is_configuration() {
        let err: Error = SchedulerError::MissingExecutor.into();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err: Error = SchedulerError::task_not_found("x").into();
        assert_eq!(err.kind(), ErrorKind::Api);
    }

    #[test]
    fn test_error_conversion() {
        let unified: Error = ParseError::InvalidDate("13/45".to_string()).into();
        assert!(matches!(unified, Error::Parse(_)));
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&ErrorKind::Configuration).unwrap();
        assert_eq!(json, "\"configuration\"");
    }
}
