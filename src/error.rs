//! Error types for batch-fetch
//!
//! This module provides error handling for the library, including:
//! - Batch rejection conditions (wrong method, malformed target, empty batch, overload)
//! - Internal invariant violations on the outcome table
//! - HTTP status code mapping for the transport binding

use thiserror::Error;

/// Result type alias for batch-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for batch-fetch
///
/// Rejections (`MethodNotAllowed`, `MalformedTarget`, `EmptyBatch`, `Overloaded`) are
/// batch-fatal and are detected before any sub-fetch starts. Per-target fetch failures
/// are not errors at this level; they are recorded as [`crate::types::FetchFailure`]
/// inside the outcome table.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_batches")
        key: Option<String>,
    },

    /// The request used a method other than the batch submission method
    #[error("method {method} not allowed, batches must be submitted with POST")]
    MethodNotAllowed {
        /// The method the client used
        method: String,
    },

    /// A body line is not a syntactically valid absolute URL
    #[error("malformed target on line {line}: {reason}")]
    MalformedTarget {
        /// 1-based line number within the request body
        line: usize,
        /// Why the URL parser rejected the line
        reason: String,
    },

    /// The body contained no targets
    #[error("batch contains no targets")]
    EmptyBatch,

    /// The admission gate is at capacity
    #[error("too many batches in flight (limit {limit})")]
    Overloaded {
        /// Configured maximum of simultaneously executing batches
        limit: usize,
    },

    /// The request body could not be read
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// A second terminal outcome was written for the same target
    #[error("outcome for {target} already recorded")]
    DuplicateOutcome {
        /// The target whose outcome was written twice
        target: String,
    },

    /// Resolution found a target without a terminal outcome
    #[error("outcome for {target} is not terminal")]
    PendingOutcome {
        /// The target left without a terminal outcome
        target: String,
    },

    /// An outcome was written for a target that was never registered
    #[error("outcome for unregistered target {target}")]
    UnknownTarget {
        /// The target that is missing from the table
        target: String,
    },

    /// The shared HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

impl Error {
    /// Whether this error is a client-facing rejection rather than an internal fault
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::MethodNotAllowed { .. }
                | Error::MalformedTarget { .. }
                | Error::EmptyBatch
                | Error::Overloaded { .. }
        )
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 405 Method Not Allowed
            Error::MethodNotAllowed { .. } => 405,

            // 400 Bad Request - Client error (invalid input)
            Error::MalformedTarget { .. } => 400,
            Error::EmptyBatch => 400,
            Error::BodyRead(_) => 400,

            // 429 Too Many Requests - admission gate saturated
            Error::Overloaded { .. } => 429,

            // 500 Internal Server Error - Server-side issues
            Error::Config { .. } => 500,
            Error::DuplicateOutcome { .. } => 500,
            Error::PendingOutcome { .. } => 500,
            Error::UnknownTarget { .. } => 500,
            Error::HttpClient(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::MethodNotAllowed { .. } => "method_not_allowed",
            Error::MalformedTarget { .. } => "malformed_target",
            Error::EmptyBatch => "empty_batch",
            Error::Overloaded { .. } => "overloaded",
            Error::BodyRead(_) => "body_read_error",
            Error::DuplicateOutcome { .. } => "duplicate_outcome",
            Error::PendingOutcome { .. } => "pending_outcome",
            Error::UnknownTarget { .. } => "unknown_target",
            Error::HttpClient(_) => "http_client_error",
            Error::Io(_) => "io_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}
