//! Turning a file tree and a request into a [`DownloadSet`].
//!
//! Resolution is a pure function of the tree and the request. Full mode
//! takes every file's complete object; incremental mode takes only what a
//! diff from the requested base version says changed: patch payloads for
//! modified files and complete objects for added ones.

mod error;
mod set;

pub use error::{SelectionError, SelectionResult};
pub use set::{DownloadEntry, DownloadSet};

use crate::tree::{FileNode, FileTree};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    Full,
    Incremental { base_version: String },
}

/// Restricts a selection to part of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathFilter {
    /// A directory (everything below it) or a single file path.
    Prefix(String),
    /// Case-insensitive substring of the path.
    Contains(String),
}

impl PathFilter {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathFilter::Prefix(prefix) => {
                let prefix = prefix.replace('\\', "/");
                let prefix = prefix.trim_matches('/');
                prefix.is_empty()
                    || path == prefix
                    || path
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            PathFilter::Contains(keyword) => path.to_lowercase().contains(&keyword.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    pub mode: SelectionMode,
    pub path_filter: Option<PathFilter>,
}

impl SelectionRequest {
    pub fn full() -> Self {
        Self {
            mode: SelectionMode::Full,
            path_filter: None,
        }
    }

    pub fn incremental(base_version: impl Into<String>) -> Self {
        Self {
            mode: SelectionMode::Incremental {
                base_version: base_version.into(),
            },
            path_filter: None,
        }
    }

    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.path_filter = Some(filter);
        self
    }

    fn admits(&self, path: &str) -> bool {
        self.path_filter.as_ref().map_or(true, |f| f.matches(path))
    }
}

/// Suffix under which diff payloads are saved next to the file they patch.
pub const PATCH_SUFFIX: &str = ".hdiff";

fn patch_destination(path: &str) -> String {
    format!("{}{}", path, PATCH_SUFFIX)
}

/// Compute the download set for `request` over `tree`.
///
/// Entries are ordered lexicographically by destination and indexed in that
/// order. Diff payloads never overwrite the file they patch; they are saved as
/// `<path>.hdiff`.
pub fn resolve(tree: &FileTree, request: &SelectionRequest) -> SelectionResult<DownloadSet> {
    let files: Vec<&FileNode> = tree.files().filter(|n| request.admits(n.path())).collect();

    let (mut items, obsolete) = match &request.mode {
        SelectionMode::Full => {
            let items = files
                .into_iter()
                .filter_map(|n| n.object().map(|o| (n.path().to_string(), o.clone(), n.locale())))
                .collect::<Vec<_>>();
            (items, Vec::new())
        }
        SelectionMode::Incremental { base_version } => {
            let diff = match tree.diff() {
                Some(diff) if &diff.base_version == base_version => diff,
                other => {
                    return Err(SelectionError::IncompatibleBaseVersion {
                        requested: base_version.clone(),
                        available: other
                            .map(|d| d.base_version.clone())
                            .unwrap_or_else(|| "none".to_string()),
                    })
                }
            };

            let items = files
                .into_iter()
                .filter_map(|n| {
                    if diff.is_added(n.path()) {
                        n.object()
                            .map(|o| (n.path().to_string(), o.clone(), n.locale()))
                    } else {
                        n.patch()
                            .map(|o| (patch_destination(n.path()), o.clone(), n.locale()))
                    }
                })
                .collect::<Vec<_>>();
            let obsolete = diff
                .deleted
                .iter()
                .filter(|p| request.admits(p))
                .cloned()
                .collect();
            (items, obsolete)
        }
    };

    if items.is_empty() {
        return Err(SelectionError::EmptySelection);
    }
    items.sort_by(|a, b| a.0.cmp(&b.0));
    DownloadSet::from_ordered(tree.target().clone(), items, obsolete)
}
