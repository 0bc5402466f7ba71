//! Version tags as published in the version catalog.

use std::cmp::Ordering;
use std::fmt;

use semver::Version;

/// A published version tag.
///
/// Publishers are not strict about semantic versioning (`"1.0"` and
/// `"2.7.0"` both occur), so the tag is normalized to three numeric
/// components for ordering while the original text is kept for URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GameVersion {
    raw: String,
    parsed: Version,
}

impl GameVersion {
    /// Parse a version tag, padding missing minor/patch components with zero.
    ///
    /// Returns `None` if the tag is not made of one to three numeric parts
    /// (optionally followed by a semver pre-release suffix).
    pub fn parse(tag: &str) -> Option<Self> {
        let trimmed = tag.trim();
        let (numbers, suffix) = match trimmed.split_once('-') {
            Some((n, s)) => (n, Some(s)),
            None => (trimmed, None),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return None;
        }
        if parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
        {
            return None;
        }

        let mut padded = parts.join(".");
        for _ in parts.len()..3 {
            padded.push_str(".0");
        }
        if let Some(s) = suffix {
            padded.push('-');
            padded.push_str(s);
        }

        Version::parse(&padded).ok().map(|parsed| Self {
            raw: trimmed.to_string(),
            parsed,
        })
    }

    /// The tag exactly as published.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The normalized semantic version.
    pub fn semver(&self) -> &Version {
        &self.parsed
    }
}

impl Ord for GameVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parsed
            .cmp(&other.parsed)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for GameVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_tags_are_padded() {
        let v = GameVersion::parse("1.0").unwrap();
        assert_eq!(v.as_str(), "1.0");
        assert_eq!(v.semver(), &Version::new(1, 0, 0));
    }

    #[test]
    fn test_numeric_ordering() {
        let mut versions: Vec<_> = ["2.10.0", "2.9.1", "1.0", "2.9"]
            .iter()
            .map(|t| GameVersion::parse(t).unwrap())
            .collect();
        versions.sort();
        let tags: Vec<_> = versions.iter().map(|v| v.as_str()).collect();
        assert_eq!(tags, vec!["1.0", "2.9", "2.9.1", "2.10.0"]);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(GameVersion::parse("").is_none());
        assert!(GameVersion::parse("v1.0").is_none());
        assert!(GameVersion::parse("1..0").is_none());
        assert!(GameVersion::parse("1.2.3.4").is_none());
    }

    #[test]
    fn test_prerelease_suffix() {
        let beta = GameVersion::parse("5.1.0-beta").unwrap();
        let release = GameVersion::parse("5.1.0").unwrap();
        assert!(beta < release);
    }
}
