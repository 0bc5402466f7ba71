//! Manifest parsing and merging into a [`FileTree`].
//!
//! Each document kind has its own sub-parser that yields
//! [`ManifestEntry`] values; the merge step does not care which variant an
//! entry came from, only its [`EntryRole`].

mod diff;
mod path;
mod pkg_version;

use std::collections::BTreeSet;

use tracing::debug;

use self::diff::DiffIndex;
use self::pkg_version::PkgVersionIndex;
use super::document::{DocumentKind, RawDocument};
use super::error::{ParseError, ParseResult};
use crate::game::{LocaleSelection, VoiceLocale};
use crate::tree::{DiffInfo, FileTree, RemoteObjectRef, TreeBuilder, TreeConflict};

pub(crate) use self::path::normalize_path;

/// Diff schema versions understood when no configuration says otherwise.
pub const DEFAULT_DIFF_SCHEMAS: [u32; 1] = [1];

/// How an entry contributes to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRole {
    /// A complete file of the target version.
    Full,
    /// A diff payload for a file that exists in the package index.
    Patch,
    /// A file the diff introduces.
    Added,
}

/// One file entry produced by a sub-parser.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub path: String,
    pub object: RemoteObjectRef,
    pub role: EntryRole,
    pub locale: Option<VoiceLocale>,
    pub content_hash: Option<String>,
}

/// Parses raw documents into a merged [`FileTree`].
#[derive(Debug, Clone)]
pub struct ManifestParser {
    supported_diff_schemas: Vec<u32>,
}

impl Default for ManifestParser {
    fn default() -> Self {
        Self::new(DEFAULT_DIFF_SCHEMAS.to_vec())
    }
}

impl ManifestParser {
    pub fn new(supported_diff_schemas: Vec<u32>) -> Self {
        Self {
            supported_diff_schemas,
        }
    }

    pub fn supported_diff_schemas(&self) -> &[u32] {
        &self.supported_diff_schemas
    }

    /// Parse and merge `documents` for the locales in `locales`.
    ///
    /// Voice documents for locales outside `locales` are skipped unparsed.
    pub fn parse(
        &self,
        documents: &[RawDocument],
        locales: &LocaleSelection,
    ) -> ParseResult<FileTree> {
        let package_count = documents
            .iter()
            .filter(|d| d.kind == DocumentKind::PackageIndex)
            .count();
        if package_count != 1 {
            return Err(ParseError::Inconsistent(format!(
                "expected exactly one package index, found {}",
                package_count
            )));
        }
        let diff_count = documents
            .iter()
            .filter(|d| matches!(d.kind, DocumentKind::DiffIndex { .. }))
            .count();
        if diff_count > 1 {
            return Err(ParseError::Inconsistent(format!(
                "at most one diff index may be merged, found {}",
                diff_count
            )));
        }

        let target = documents[0].target.clone();
        if let Some(other) = documents.iter().find(|d| d.target != target) {
            return Err(ParseError::Inconsistent(format!(
                "{} belongs to {}, not {}",
                other.kind, other.target, target
            )));
        }

        let mut ordered: Vec<&RawDocument> = documents
            .iter()
            .filter(|d| match d.kind {
                DocumentKind::VoiceIndex(locale) => locales.contains(locale),
                _ => true,
            })
            .collect();
        ordered.sort_by_key(|d| d.kind.rank());

        let mut builder = TreeBuilder::new(target.clone());
        for document in ordered {
            let name = document.kind.file_name();
            match &document.kind {
                DocumentKind::PackageIndex | DocumentKind::VoiceIndex(_) => {
                    let locale = match document.kind {
                        DocumentKind::VoiceIndex(l) => Some(l),
                        _ => None,
                    };
                    let index =
                        PkgVersionIndex::new(name, &document.bytes, &document.object_base, locale)?;
                    let mut count = 0usize;
                    for entry in index.entries() {
                        merge_entry(&mut builder, entry?, None)?;
                        count += 1;
                    }
                    debug!(document = %document.kind, entries = count, "Merged index");
                }
                DocumentKind::DiffIndex { base_version } => {
                    let diff = DiffIndex::parse(
                        &name,
                        &document.bytes,
                        &document.object_base,
                        &self.supported_diff_schemas,
                    )?;
                    if diff.target_version != target.version {
                        return Err(ParseError::Inconsistent(format!(
                            "{} targets version {}, documents are for {}",
                            name, diff.target_version, target.version
                        )));
                    }
                    if &diff.base_version != base_version {
                        return Err(ParseError::Inconsistent(format!(
                            "{} declares base version {}, requested {}",
                            name, diff.base_version, base_version
                        )));
                    }

                    let mut info = DiffInfo {
                        base_version: diff.base_version,
                        target_version: diff.target_version,
                        added: BTreeSet::new(),
                        deleted: diff.deleted,
                    };
                    let count = diff.entries.len();
                    for entry in diff.entries {
                        merge_entry(&mut builder, entry, Some(&mut info))?;
                    }
                    debug!(document = %document.kind, entries = count, "Merged diff");
                    builder.set_diff(info);
                }
            }
        }

        Ok(builder.build())
    }
}

fn merge_entry(
    builder: &mut TreeBuilder,
    entry: ManifestEntry,
    diff: Option<&mut DiffInfo>,
) -> ParseResult<()> {
    let ManifestEntry {
        path,
        object,
        role,
        locale,
        content_hash,
    } = entry;

    match role {
        EntryRole::Full => {
            builder
                .insert_file(&path, object, locale, content_hash)
                .map_err(conflict)?;
        }
        EntryRole::Patch => {
            builder.attach_patch(&path, object).map_err(conflict)?;
        }
        EntryRole::Added => {
            builder
                .insert_file(&path, object, locale, content_hash)
                .map_err(conflict)?;
            if let Some(info) = diff {
                info.added.insert(path);
            }
        }
    }
    Ok(())
}

fn conflict(err: TreeConflict) -> ParseError {
    ParseError::Inconsistent(err.to_string())
}
