//! Manifest fetch and parse errors.

use thiserror::Error;

/// Failures while retrieving manifest documents.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The document does not exist at any configured source.
    #[error("manifest not found: {url}")]
    NotFound { url: String },

    #[error("manifest source unreachable: {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("manifest request timed out after {timeout_secs}s: {url}")]
    Timeout { url: String, timeout_secs: u64 },
}

impl FetchError {
    /// Whether another mirror is worth trying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Unreachable { .. } | FetchError::Timeout { .. })
    }
}

/// Failures while turning raw documents into a file tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The document is readable but not in a format this parser knows.
    #[error("{document}: unrecognized manifest schema: {detail}")]
    SchemaUnrecognized { document: String, detail: String },

    /// The document is syntactically or semantically invalid.
    #[error("{document} line {line}: malformed entry: {detail}")]
    Malformed {
        document: String,
        line: usize,
        detail: String,
    },

    /// The documents are individually valid but contradict each other.
    #[error("inconsistent manifests: {0}")]
    Inconsistent(String),
}

pub type FetchResult<T> = Result<T, FetchError>;
pub type ParseResult<T> = Result<T, ParseError>;
