//! Error types for agdash.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! - **Configuration**: config file parsing, validation, unknown family names
//! - **Source**: the metrics source failed to produce a document ([`ProducerError`])
//! - **Server**: binding or serving the HTTP listener
//! - **Internal**: I/O, JSON, and unclassified errors
//!
//! Snapshot store failures never show up here. The store recovers them
//! locally (reads become "absent", writes return `false`).

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration issues (parse errors, invalid values, unknown names).
    Configuration,
    /// The metrics source could not produce a document.
    Source,
    /// The HTTP listener could not be started or failed while serving.
    Server,
    /// Internal errors (I/O, serialization, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::Source => "Metrics source error",
            Self::Server => "Server error",
            Self::Internal => "Internal error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Invalid configuration or arguments
    ConfigError = 2,
    /// The metrics source failed
    SourceError = 3,
    /// Timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

// =============================================================================
// Producer Errors
// =============================================================================

/// Failure of the metrics source to produce a document.
///
/// On the background refresh path these are logged and dropped. On the
/// synchronous path they are handed back to the caller as a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    /// The upstream could not be reached.
    #[error("metrics source unreachable: {0}")]
    Network(String),

    /// The upstream did not answer in time.
    #[error("metrics source timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The upstream answered with a non-success status.
    #[error("metrics source returned HTTP {status}")]
    Http { status: u16 },

    /// The upstream body was not a JSON object.
    #[error("metrics source returned an invalid document: {0}")]
    InvalidDocument(String),

    /// The upstream produced an empty document.
    #[error("metrics source returned an empty document")]
    Empty,

    /// The producer task panicked or was aborted.
    #[error("metrics producer aborted: {0}")]
    Panicked(String),

    /// Any other producer-specific failure.
    #[error("{0}")]
    Other(String),
}

impl ProducerError {
    /// Short machine-readable label used in degraded documents.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout { .. } => "timeout",
            Self::Http { .. } => "http",
            Self::InvalidDocument(_) => "invalid_document",
            Self::Empty => "empty",
            Self::Panicked(_) => "panicked",
            Self::Other(_) => "other",
        }
    }

    /// Build a timeout error from a duration.
    #[must_use]
    pub const fn timeout(after: Duration) -> Self {
        Self::Timeout {
            seconds: after.as_secs(),
        }
    }
}

// =============================================================================
// Crate Error
// =============================================================================

/// Main error type for agdash operations.
#[derive(Error, Debug)]
pub enum AgdashError {
    // ==========================================================================
    // Configuration errors
    // ==========================================================================
    /// Error parsing configuration file.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// Invalid value in configuration.
    #[error("invalid config value for '{key}': {message}")]
    ConfigInvalid {
        key: String,
        value: String,
        message: String,
    },

    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown metric family name.
    #[error("unknown metric family: {0}")]
    InvalidFamily(String),

    // ==========================================================================
    // Source errors
    // ==========================================================================
    /// The metrics source failed on a path where the caller asked to wait.
    #[error("refresh failed for {family}: {source}")]
    Producer {
        family: String,
        #[source]
        source: ProducerError,
    },

    // ==========================================================================
    // Server errors
    // ==========================================================================
    /// Could not bind the HTTP listener.
    #[error("failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },

    // ==========================================================================
    // I/O errors
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure at the command boundary, with its context chain.
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl AgdashError {
    /// Map error to process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::Config(_)
            | Self::InvalidFamily(_) => ExitCode::ConfigError,

            Self::Producer {
                source: ProducerError::Timeout { .. },
                ..
            } => ExitCode::Timeout,
            Self::Producer { .. } => ExitCode::SourceError,

            Self::Bind { .. } | Self::Io(_) | Self::Json(_) | Self::Other(_) => {
                ExitCode::GeneralError
            }
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::Config(_)
            | Self::InvalidFamily(_) => ErrorCategory::Configuration,
            Self::Producer { .. } => ErrorCategory::Source,
            Self::Bind { .. } => ErrorCategory::Server,
            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }
}

/// Result type alias for agdash operations.
pub type Result<T> = std::result::Result<T, AgdashError>;
