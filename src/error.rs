//! Error types for comic-dl
//!
//! A single [`Error`] enum covers every layer: configuration, crawling, fetching,
//! image processing and session logging. Retry decisions are made on top of it by
//! [`crate::retry::IsRetryable`].

use thiserror::Error;

/// Result type alias for comic-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for comic-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "worker_count")
        key: Option<String>,
    },

    /// Network error (connect, timeout, reset, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with something other than 200 OK
    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus {
        /// Status code returned by the server
        status: u16,
        /// Requested URL
        url: String,
    },

    /// A page did not expose the structure the crawler depends on
    #[error("failed to parse {url}: {reason}")]
    Parse {
        /// URL of the page that failed to parse
        url: String,
        /// What was missing
        reason: String,
    },

    /// Invalid URL (endpoint, next-page link or image source)
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Image decode, copy or encode failed
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Column count outside the supported range for the given image
    #[error("invalid column count {columns} for image height {height}")]
    InvalidColumns {
        /// Requested number of bands
        columns: u32,
        /// Height of the image being descrambled
        height: u32,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operator interrupt; aborts retries and the worker pool
    #[error("operation cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Build a parse error for a page
    pub fn parse(url: &str, reason: impl Into<String>) -> Self {
        Error::Parse {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// True if this error is an operator cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            Error::Cancelled
        } else {
            Error::Other(format!("task panicked: {e}"))
        }
    }
}
