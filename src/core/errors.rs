//! Custom error types for translation operations

use thiserror::Error;

/// Translation-related errors
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Missing credentials or an invalid option
    #[error("Configuration error: {message}")]
    Configuration {
        /// Details
        message: String,
    },

    /// Input file is neither EPUB nor plain text
    #[error("Unsupported file format: {path} (only .epub and .txt are supported)")]
    UnsupportedFormat {
        /// File involved
        path: String,
    },

    /// Resume was requested but no usable checkpoint exists
    #[error("Checkpoint unavailable at {path}: {message}")]
    CheckpointUnavailable {
        /// File involved
        path: String,
        /// Details
        message: String,
    },

    /// Checkpoint could not be persisted
    #[error("Failed to write checkpoint {path}: {message}")]
    CheckpointWrite {
        /// File involved
        path: String,
        /// Details
        message: String,
    },

    /// Bilingual output could not be written
    #[error("Failed to write bilingual output {path}: {message}")]
    Emit {
        /// File involved
        path: String,
        /// Details
        message: String,
    },

    /// A single engine call failed after the engine's own policy ran out
    #[error("Translation engine failed: {message}")]
    EngineTransient {
        /// Details
        message: String,
    },

    /// API request failed
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Details
        message: String,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Retry after {retry_after:?} seconds")]
    RateLimit {
        /// Seconds from the `Retry-After` header, if sent
        retry_after: Option<u64>,
    },

    /// Network error
    #[error("Network error: {message}")]
    Network {
        /// Details
        message: String,
    },

    /// Invalid response from API
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Details
        message: String,
    },

    /// Malformed document content
    #[error("Invalid document: {message}")]
    InvalidDocument {
        /// Details
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Zip container error
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl TranslationError {
    /// Whether this error describes a single failed remote call that an
    /// engine policy may retry or degrade.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TranslationError::Api { .. }
                | TranslationError::RateLimit { .. }
                | TranslationError::Network { .. }
                | TranslationError::InvalidResponse { .. }
                | TranslationError::Http(_)
                | TranslationError::EngineTransient { .. }
        )
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        TranslationError::Configuration {
            message: message.into(),
        }
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslationError>;
