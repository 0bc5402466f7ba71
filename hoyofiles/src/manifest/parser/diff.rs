//! Diff indices describing what changed since an older version.
//!
//! ```text
//! {
//!   "schema": 1,
//!   "baseVersion": "4.8.0",
//!   "targetVersion": "5.0.0",
//!   "files": [
//!     {"remoteName": "b.pak", "md5": "…", "fileSize": 12, "kind": "patch", "patchName": "b.pak.hdiff"},
//!     {"remoteName": "c.pak", "md5": "…", "fileSize": 90, "kind": "new"}
//!   ],
//!   "deleted": ["old.pak"]
//! }
//! ```
//!
//! For `patch` entries `md5`/`fileSize` describe the patch payload, for
//! `new` entries they describe the full file.

use serde::Deserialize;
use serde_json::Value;

use super::path::normalize_path;
use super::{EntryRole, ManifestEntry};
use crate::integrity::Checksum;
use crate::manifest::error::{ParseError, ParseResult};
use crate::tree::{join_url, RemoteObjectRef};

const REQUIRED_KEYS: [&str; 4] = ["schema", "baseVersion", "targetVersion", "files"];
const REQUIRED_FILE_KEYS: [&str; 4] = ["remoteName", "md5", "fileSize", "kind"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiffDocument {
    base_version: String,
    target_version: String,
    files: Vec<DiffFile>,
    #[serde(default)]
    deleted: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiffFile {
    remote_name: String,
    md5: String,
    file_size: u64,
    kind: DiffFileKind,
    #[serde(default)]
    patch_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DiffFileKind {
    Patch,
    New,
}

/// A fully parsed diff index.
#[derive(Debug)]
pub(super) struct DiffIndex {
    pub(super) base_version: String,
    pub(super) target_version: String,
    pub(super) entries: Vec<ManifestEntry>,
    pub(super) deleted: Vec<String>,
}

impl DiffIndex {
    pub(super) fn parse(
        document: &str,
        bytes: &[u8],
        object_base: &str,
        supported_schemas: &[u32],
    ) -> ParseResult<Self> {
        let malformed = |detail: String| ParseError::Malformed {
            document: document.to_string(),
            line: 1,
            detail,
        };
        let unrecognized = |detail: String| ParseError::SchemaUnrecognized {
            document: document.to_string(),
            detail,
        };

        let value: Value = serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
        let Some(fields) = value.as_object() else {
            return Err(unrecognized("document is not a JSON object".to_string()));
        };
        if let Some(missing) = REQUIRED_KEYS.iter().find(|k| !fields.contains_key(**k)) {
            return Err(unrecognized(format!("missing `{}`", missing)));
        }

        let schema = fields
            .get("schema")
            .and_then(Value::as_u64)
            .ok_or_else(|| malformed("`schema` is not an unsigned integer".to_string()))?;
        if !supported_schemas.iter().any(|s| u64::from(*s) == schema) {
            return Err(unrecognized(format!(
                "schema {} is not one of {:?}",
                schema, supported_schemas
            )));
        }

        if let Some(files) = fields.get("files").and_then(Value::as_array) {
            for (i, file) in files.iter().enumerate() {
                let Some(file) = file.as_object() else {
                    return Err(malformed(format!("files[{}] is not an object", i)));
                };
                if let Some(missing) = REQUIRED_FILE_KEYS.iter().find(|k| !file.contains_key(**k)) {
                    return Err(unrecognized(format!("files[{}] lacks `{}`", i, missing)));
                }
            }
        }

        let doc: DiffDocument = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

        let mut entries = Vec::with_capacity(doc.files.len());
        for file in doc.files {
            let path = normalize_path(&file.remote_name).map_err(&malformed)?;
            let checksum = Checksum::md5(&file.md5).map_err(|e| malformed(e.to_string()))?;
            let entry = match file.kind {
                DiffFileKind::Patch => {
                    let payload = match &file.patch_name {
                        Some(name) => normalize_path(name).map_err(&malformed)?,
                        None => path.clone(),
                    };
                    ManifestEntry {
                        object: RemoteObjectRef::new(
                            join_url(object_base, &payload),
                            file.file_size,
                            checksum,
                        )
                        .as_diff_patch(),
                        path,
                        role: EntryRole::Patch,
                        locale: None,
                        content_hash: None,
                    }
                }
                DiffFileKind::New => ManifestEntry {
                    object: RemoteObjectRef::new(join_url(object_base, &path), file.file_size, checksum),
                    path,
                    role: EntryRole::Added,
                    locale: None,
                    content_hash: None,
                },
            };
            entries.push(entry);
        }

        let deleted = doc
            .deleted
            .iter()
            .map(|p| normalize_path(p).map_err(&malformed))
            .collect::<ParseResult<Vec<_>>>()?;

        Ok(Self {
            base_version: doc.base_version,
            target_version: doc.target_version,
            entries,
            deleted,
        })
    }
}
