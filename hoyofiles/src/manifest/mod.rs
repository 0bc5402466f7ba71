//! Manifest retrieval and parsing.
//!
//! - `source`: the [`ManifestSource`] seam and its reqwest implementation
//! - `fetcher`: mirror fallback, URL layout, conditional revalidation
//! - `parser`: per-variant sub-parsers and the merge into a [`crate::tree::FileTree`]
//!
//! ```text
//! ManifestFetcher ──► Vec<RawDocument> ──► ManifestParser ──► FileTree
//!        │
//!        └── ManifestSource (HttpManifestSource in production)
//! ```

mod document;
mod error;
mod fetcher;
mod parser;
mod source;

pub use document::{DocumentKind, RawDocument};
pub use error::{FetchError, FetchResult, ParseError, ParseResult};
pub use fetcher::{FetchedDocument, ManifestFetcher};
pub use parser::{EntryRole, ManifestEntry, ManifestParser, DEFAULT_DIFF_SCHEMAS};
pub use source::{HttpManifestSource, ManifestSource, SourceResponse};

pub(crate) use parser::normalize_path;

#[cfg(test)]
pub(crate) use fetcher::tests::MemorySource;
