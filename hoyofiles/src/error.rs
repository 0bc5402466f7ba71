//! Crate-level error type.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::game::GameId;
use crate::manifest::{FetchError, ParseError};
use crate::selection::SelectionError;

/// Any failure surfaced by [`crate::Engine`].
///
/// Cloneable so a single failed load can be handed to every caller that
/// was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("{game} has no published version `{version}`")]
    UnknownVersion { game: GameId, version: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
