//! Download sets.

use std::collections::HashSet;

use super::error::{SelectionError, SelectionResult};
use crate::catalog::CatalogArchive;
use crate::game::{GameTarget, VoiceLocale};
use crate::tree::RemoteObjectRef;

/// One file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEntry {
    /// Position in the set; stable for the life of the set.
    pub index: usize,
    /// Relative `/`-separated path under the destination root.
    pub destination: String,
    pub object: RemoteObjectRef,
    pub locale: Option<VoiceLocale>,
}

/// An ordered list of files to fetch for one target.
///
/// No two entries share a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSet {
    target: GameTarget,
    entries: Vec<DownloadEntry>,
    obsolete: Vec<String>,
}

impl DownloadSet {
    /// Assign indices in the given order, rejecting duplicate destinations.
    pub(crate) fn from_ordered(
        target: GameTarget,
        items: Vec<(String, RemoteObjectRef, Option<VoiceLocale>)>,
        obsolete: Vec<String>,
    ) -> SelectionResult<Self> {
        let mut seen = HashSet::with_capacity(items.len());
        let mut entries = Vec::with_capacity(items.len());
        for (index, (destination, object, locale)) in items.into_iter().enumerate() {
            if !seen.insert(destination.clone()) {
                return Err(SelectionError::DuplicateDestination(destination));
            }
            entries.push(DownloadEntry {
                index,
                destination,
                object,
                locale,
            });
        }
        Ok(Self {
            target,
            entries,
            obsolete,
        })
    }

    /// Build a set from catalog archives, saved under their file names.
    ///
    /// Entries are ordered by destination.
    pub fn from_archives(target: GameTarget, archives: &[CatalogArchive]) -> SelectionResult<Self> {
        if archives.is_empty() {
            return Err(SelectionError::EmptySelection);
        }
        let mut items = Vec::with_capacity(archives.len());
        for archive in archives {
            let object = archive
                .package
                .to_object()
                .map_err(|e| SelectionError::InvalidArchive(e.to_string()))?;
            let name = archive.package.display_name();
            let destination = crate::manifest::normalize_path(name).map_err(|reason| {
                SelectionError::InvalidArchive(format!("{}: {}", name, reason))
            })?;
            items.push((destination, object, None));
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Self::from_ordered(target, items, Vec::new())
    }

    pub fn target(&self) -> &GameTarget {
        &self.target
    }

    pub fn entries(&self) -> &[DownloadEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&DownloadEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all object sizes.
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.object.size_bytes).sum()
    }

    /// Paths the diff declares removed; callers may delete them after applying.
    pub fn obsolete(&self) -> &[String] {
        &self.obsolete
    }
}
