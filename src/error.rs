//! Error types for nested sub-resource operations

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while managing a list-embedded sub-resource
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Create found a structurally identical element already in the list
    #[error("unable to create {kind}, existing object already found: {existing}")]
    AlreadyExists { kind: &'static str, existing: String },

    /// The element (or its parent) does not exist.
    /// Raised by the delete encoder as a stand-in for an HTTP 404.
    #[error("nested {kind} not found")]
    NotFound { kind: &'static str },

    /// The parent's JSON did not have the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Two list elements share the same match key
    #[error("{kind} matches more than one element (indexes {first} and {second})")]
    AmbiguousMatch {
        kind: &'static str,
        first: usize,
        second: usize,
    },

    #[error("timed out after {timeout:?} waiting for operation: {activity}")]
    OperationTimeout { activity: String, timeout: Duration },

    #[error("operation failed while {activity}: {message}")]
    OperationFailed { activity: String, message: String },

    #[error("timed out after {timeout:?} waiting for lock on {key}")]
    LockTimeout { key: String, timeout: Duration },

    /// Non-success HTTP status returned by the API
    #[error("API request failed: {status} {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// User configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to resolve template: {0}")]
    Template(String),

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl Error {
    /// Create an invalid configuration error with the given message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a malformed response error with the given message
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// True for both the spoofed not-found and a real HTTP 404
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::Api { status: 404, .. }
        )
    }

    /// True for statuses the transport is allowed to retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Api {
                status: 429 | 500 | 502 | 503 | 504,
                ..
            }
        )
    }
}

/// Format an error for display on the command line.
/// API failures are mapped to short messages without echoing raw API detail.
pub fn format_error(error: &Error) -> String {
    match error {
        Error::Api { status: 401, .. } => {
            "Authentication failed. Run 'gcloud auth application-default login'.".to_string()
        },
        Error::Api { status: 403, .. } => {
            "Permission denied. Check your Access Context Manager IAM permissions.".to_string()
        },
        Error::Api { status: 404, .. } => "Service perimeter not found.".to_string(),
        Error::Api { status: 409, .. } => {
            "Perimeter is being modified concurrently. Try again.".to_string()
        },
        Error::Api { status: 429, .. } => {
            "Rate limit exceeded. Please try again later.".to_string()
        },
        Error::Api { status: 400, .. } => "Invalid request. Check your parameters.".to_string(),
        Error::Api { status, .. } if *status >= 500 => {
            "Access Context Manager temporarily unavailable. Please try again.".to_string()
        },
        other => other.to_string(),
    }
}
