//! Error taxonomy for ingestion and retrieval.
//!
//! Every failure a caller can observe is one of these variants; the HTTP
//! layer maps them onto status codes and the JSON error envelope. Nothing
//! here is silently swallowed — session expiry and quota rejection are
//! expected conditions the caller handles, not bugs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocsiftError {
    /// The user's ingestion quota for the current window is exhausted.
    /// Not retried automatically; the window must lapse first.
    #[error("ingestion quota exceeded for user '{user_id}'")]
    QuotaExceeded { user_id: String },

    /// The session id is unknown or has expired. Callers should start a
    /// fresh session.
    #[error("session '{session_id}' not found or expired")]
    SessionNotFound { session_id: String },

    /// A vector of the wrong dimensionality reached the index. This is a
    /// configuration or programming error, fatal to the request.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding backend could not be reached or timed out. Transient;
    /// the whole ingestion/retrieval call is safe to retry.
    #[error("embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The operation exceeded its configured deadline. Partial index state
    /// committed before the deadline is retained.
    #[error("operation timed out after {0} seconds")]
    OperationTimedOut(u64),

    /// An uploaded file exceeds the configured per-file byte limit.
    #[error("file '{filename}' exceeds the maximum size of {limit} bytes")]
    FileTooLarge { filename: String, limit: usize },

    /// An uploaded file's extension is not on the allow-list.
    #[error("file '{filename}' has an unsupported extension")]
    UnsupportedExtension { filename: String },

    /// The upload contains more files than the per-request limit.
    #[error("too many files in one request: {count} > {limit}")]
    TooManyFiles { count: usize, limit: usize },

    /// A query with no searchable content.
    #[error("query must not be empty")]
    EmptyQuery,

    /// The upload carried no files at all.
    #[error("no files in upload")]
    NoFiles,

    /// Text extraction failed for a file (bad bytes, unreadable archive).
    #[error("extraction failed for '{filename}': {reason}")]
    ExtractionFailed { filename: String, reason: String },
}

impl DocsiftError {
    /// Machine-readable code used in the HTTP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            DocsiftError::QuotaExceeded { .. } => "quota_exceeded",
            DocsiftError::SessionNotFound { .. } => "session_not_found",
            DocsiftError::DimensionMismatch { .. } => "dimension_mismatch",
            DocsiftError::EmbeddingUnavailable(_) => "embedding_unavailable",
            DocsiftError::OperationTimedOut(_) => "timeout",
            DocsiftError::FileTooLarge { .. } => "file_too_large",
            DocsiftError::UnsupportedExtension { .. } => "unsupported_file_type",
            DocsiftError::TooManyFiles { .. } => "bad_request",
            DocsiftError::EmptyQuery => "bad_request",
            DocsiftError::NoFiles => "bad_request",
            DocsiftError::ExtractionFailed { .. } => "extraction_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, DocsiftError>;
