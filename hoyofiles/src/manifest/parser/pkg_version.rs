//! Line-oriented package and voice indices.
//!
//! Each non-blank line is one JSON object:
//!
//! ```text
//! {"remoteName": "GenshinImpact_Data/app.info", "md5": "…", "fileSize": 44, "hash": "…"}
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::path::normalize_path;
use super::{EntryRole, ManifestEntry};
use crate::game::VoiceLocale;
use crate::integrity::Checksum;
use crate::manifest::error::{ParseError, ParseResult};
use crate::tree::{join_url, RemoteObjectRef};

const REQUIRED_KEYS: [&str; 3] = ["remoteName", "md5", "fileSize"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PkgVersionLine {
    remote_name: String,
    md5: String,
    file_size: u64,
    #[serde(default)]
    hash: Option<String>,
}

/// A package index or voice index, parsed lazily line by line.
pub(super) struct PkgVersionIndex<'a> {
    document: String,
    text: &'a str,
    object_base: &'a str,
    locale: Option<VoiceLocale>,
}

impl<'a> PkgVersionIndex<'a> {
    pub(super) fn new(
        document: String,
        bytes: &'a [u8],
        object_base: &'a str,
        locale: Option<VoiceLocale>,
    ) -> ParseResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| ParseError::Malformed {
            document: document.clone(),
            line: 0,
            detail: format!("not UTF-8: {}", e),
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Ok(Self {
            document,
            text,
            object_base,
            locale,
        })
    }

    pub(super) fn entries(&self) -> impl Iterator<Item = ParseResult<ManifestEntry>> + '_ {
        self.text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(move |(i, line)| self.parse_line(i + 1, line))
    }

    fn parse_line(&self, line_no: usize, line: &str) -> ParseResult<ManifestEntry> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| self.malformed(line_no, e.to_string()))?;
        let Some(fields) = value.as_object() else {
            return Err(self.malformed(line_no, "entry is not a JSON object".to_string()));
        };
        if let Some(missing) = REQUIRED_KEYS.iter().find(|k| !fields.contains_key(**k)) {
            return Err(ParseError::SchemaUnrecognized {
                document: self.document.clone(),
                detail: format!("line {} lacks `{}`", line_no, missing),
            });
        }

        let entry: PkgVersionLine =
            serde_json::from_value(value).map_err(|e| self.malformed(line_no, e.to_string()))?;
        let path = normalize_path(&entry.remote_name).map_err(|d| self.malformed(line_no, d))?;
        let checksum =
            Checksum::md5(&entry.md5).map_err(|e| self.malformed(line_no, e.to_string()))?;

        Ok(ManifestEntry {
            object: RemoteObjectRef::new(join_url(self.object_base, &path), entry.file_size, checksum),
            path,
            role: EntryRole::Full,
            locale: self.locale,
            content_hash: entry.hash.filter(|h| !h.is_empty()),
        })
    }

    fn malformed(&self, line: usize, detail: String) -> ParseError {
        ParseError::Malformed {
            document: self.document.clone(),
            line,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<ParseResult<ManifestEntry>> {
        let index =
            PkgVersionIndex::new("pkg_version".into(), text.as_bytes(), "https://cdn/v5", None)
                .unwrap();
        index.entries().collect()
    }

    #[test]
    fn test_parses_lines_and_skips_blanks() {
        let text = concat!(
            r#"{"remoteName":"a.pak","md5":"DEADBEEF","fileSize":100,"hash":"1f2e"}"#,
            "\n\n",
            r#"{"remoteName":"dir\\b.pak","md5":"c0ffee","fileSize":7}"#,
            "\n"
        );
        let entries: Vec<_> = parse(text).into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "a.pak");
        assert_eq!(entries[0].object.url, "https://cdn/v5/a.pak");
        assert_eq!(entries[0].object.checksum.digest(), "deadbeef");
        assert_eq!(entries[0].content_hash.as_deref(), Some("1f2e"));
        assert_eq!(entries[1].path, "dir/b.pak");
        assert_eq!(entries[1].object.size_bytes, 7);
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let results = parse("{not json}\n");
        assert!(matches!(
            results[0],
            Err(ParseError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn test_missing_key_is_unrecognized_schema() {
        let results = parse(r#"{"name":"a.pak","md5":"aa","fileSize":1}"#);
        assert!(matches!(results[0], Err(ParseError::SchemaUnrecognized { .. })));
    }

    #[test]
    fn test_wrong_type_is_malformed() {
        let results = parse(r#"{"remoteName":"a.pak","md5":"aa","fileSize":"big"}"#);
        assert!(matches!(results[0], Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_traversal_path_is_malformed() {
        let results = parse(r#"{"remoteName":"../evil","md5":"aa","fileSize":1}"#);
        assert!(matches!(results[0], Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_bad_checksum_is_malformed() {
        let results = parse(r#"{"remoteName":"a","md5":"zz","fileSize":1}"#);
        assert!(matches!(results[0], Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_non_utf8_rejected() {
        let result = PkgVersionIndex::new("pkg_version".into(), &[0xff, 0xfe], "b", None);
        assert!(matches!(result, Err(ParseError::Malformed { line: 0, .. })));
    }
}
