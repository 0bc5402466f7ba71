use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// Incremental selection against a tree without a matching diff.
    #[error("no diff from version {requested} is available (tree diff base: {available})")]
    IncompatibleBaseVersion { requested: String, available: String },

    #[error("selection matched no files")]
    EmptySelection,

    #[error("more than one entry writes to {0}")]
    DuplicateDestination(String),

    #[error("archive cannot be downloaded: {0}")]
    InvalidArchive(String),
}

pub type SelectionResult<T> = Result<T, SelectionError>;
