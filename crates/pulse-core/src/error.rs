//! Error types for PULSE operations.
//!
//! This module defines [`PulseError`], the error enum shared across the PULSE
//! crates. Errors are designed for visibility: fetch failures carry enough
//! context to log meaningfully, and classification helpers let the polling
//! engine decide whether a failure is worth retrying.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`PulseError`].
pub type Result<T> = std::result::Result<T, PulseError>;

/// Error type for all PULSE operations.
#[derive(Debug, Error)]
pub enum PulseError {
    // =========================================================================
    // HTTP / Fetch Errors
    // =========================================================================
    /// Transport-level HTTP failure (connection refused, DNS, TLS, ...)
    #[error("HTTP error {operation}: {message}")]
    Http {
        operation: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Backend returned a non-success status code
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// Request exceeded the client-side timeout
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // =========================================================================
    // Parsing Errors
    // =========================================================================
    /// JSON parsing error
    #[error("JSON parse error in {context}: {message}")]
    JsonParse {
        context: String,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // =========================================================================
    // I/O Errors (logging setup)
    // =========================================================================
    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Missing required configuration field
    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (bug in PULSE)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PulseError {
    // =========================================================================
    // Constructor helpers for common error patterns
    // =========================================================================

    /// Create an HTTP transport error.
    pub fn http(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Http {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an API status error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::JsonParse {
            context: context.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error classification helpers
    // =========================================================================

    /// Returns true if this error is transient and worth retrying.
    ///
    /// The polling engine retries recoverable failures up to its retry budget;
    /// everything else also counts against the budget, but logging can use the
    /// distinction to phrase the warning.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http { .. } | Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this is an API-level (non-transport) error.
    pub fn is_api_error(&self) -> bool {
        matches!(self, Self::Api { .. })
    }
}
