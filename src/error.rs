//! Unified error handling for the magpie crate
//!
//! Domain-specific errors ([`FetchError`], [`ExtractError`]) are wrapped
//! into a single [`Error`] enum for use across module boundaries, with
//! a category classification driving retry and abort decisions.

use std::io;
use thiserror::Error;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network and page-load errors
    Network,
    /// Extraction and record-shaping errors
    Extraction,
    /// Storage and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

/// Errors from a page-load attempt, classified by how the pagination
/// walker and retry policy must react to them.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Page load exceeded the configured timeout; retried with backoff
    #[error("Page load timed out")]
    Timeout,

    /// Network-level hiccup or retryable server response (429, 5xx)
    #[error("Transient fetch failure: {0}")]
    Transient(String),

    /// Site defense triggered; never retried, escalated to the walker
    /// which aborts the product
    #[error("Blocked by site (status {status})")]
    Blocked { status: u16 },

    /// Page structurally absent; the expected end-of-pagination signal
    #[error("Page not found")]
    NotFound,

    /// Malformed URL or unrecoverable driver error; propagates immediately
    #[error("Fatal fetch error: {0}")]
    Fatal(String),

    /// Bounded retries exhausted for a Timeout/Transient failure
    #[error("Maximum retry attempts exceeded: {0}")]
    MaxRetriesExceeded(String),
}

impl FetchError {
    /// Whether the fetch layer may retry this failure with backoff.
    ///
    /// `Blocked` and `NotFound` are policy signals for the walker, not
    /// retry candidates; `Fatal` propagates immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Timeout | FetchError::Transient(_))
    }
}

/// Errors while shaping page content into typed records
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Product fields missing from a product-detail page
    #[error("Product information not found in page")]
    ProductNotFound,

    /// Item number could not be derived from the product URL
    #[error("Item number not found in URL: {0}")]
    ItemNumberNotFound(String),

    /// A single review element failed to parse; skipped, not fatal
    #[error("Review element {index} on page {page} is malformed: {reason}")]
    MalformedReview {
        page: u32,
        index: u32,
        reason: String,
    },

    /// CSS selector failed to compile
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Unified error type for the magpie crate
#[derive(Error, Debug)]
pub enum Error {
    /// Page fetch errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Extraction errors
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CSV export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Check if this error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable(),
            Self::Extract(_) => false,
            Self::Database(_) => false,
            Self::Io(_) => true,
            Self::Csv(_) => false,
            Self::Json(_) => false,
            Self::Http(_) => true,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(_) | Self::Http(_) => ErrorCategory::Network,
            Self::Extract(_) | Self::Json(_) => ErrorCategory::Extraction,
            Self::Database(_) | Self::Io(_) | Self::Csv(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

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
