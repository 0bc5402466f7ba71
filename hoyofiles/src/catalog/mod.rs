//! Per-game version catalog.
//!
//! The catalog (`{game}_versions.json`) maps each published version to its
//! downloadable archives and to the base URL of its decompressed files:
//!
//! ```text
//! {
//!   "5.0.0": {
//!     "game":   {"full": {...}, "segments": [{...}, ...]},
//!     "voice":  {"zh-cn": {...}, "en-us": {...}},
//!     "update": {"4.8.0": {"game": {...}, "voice": {...}}},
//!     "decompressed_path": "https://.../ScatteredFiles",
//!     "chunk": {"branch": "main", "package_id": "...", "password": "...", "tag": "5.0.0"}
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::game::{GameId, GameVersion};
use crate::integrity::Checksum;
use crate::tree::RemoteObjectRef;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("version catalog for {game} is not valid JSON: {reason}")]
    Malformed { game: GameId, reason: String },

    #[error("version catalog for {game} lists unparseable version `{version}`")]
    InvalidVersion { game: GameId, version: String },

    #[error("archive {name} has an unusable checksum `{checksum}`")]
    InvalidChecksum { name: String, checksum: String },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// A downloadable archive as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArchivePackage {
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default, deserialize_with = "size_from_number_or_string")]
    pub size: u64,
    #[serde(default, alias = "md5")]
    pub checksum: String,
}

impl ArchivePackage {
    /// Name to present and save under: the declared name, else the URL's file name.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        let path = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        path.rsplit('/').next().unwrap_or(path)
    }

    pub fn to_object(&self) -> CatalogResult<RemoteObjectRef> {
        let checksum = Checksum::md5(&self.checksum).map_err(|_| CatalogError::InvalidChecksum {
            name: self.display_name().to_string(),
            checksum: self.checksum.clone(),
        })?;
        Ok(RemoteObjectRef::new(self.url.clone(), self.size, checksum))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GamePackages {
    #[serde(default)]
    pub full: Option<ArchivePackage>,
    #[serde(default)]
    pub segments: Vec<ArchivePackage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdatePackages {
    #[serde(default)]
    pub game: Option<ArchivePackage>,
    #[serde(default)]
    pub voice: BTreeMap<String, ArchivePackage>,
}

/// Chunked-delivery coordinates for a version.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChunkInfo {
    pub branch: String,
    pub package_id: String,
    pub password: String,
    pub tag: String,
}

/// Everything the catalog says about one version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VersionEntry {
    #[serde(default)]
    pub game: GamePackages,
    #[serde(default)]
    pub voice: BTreeMap<String, ArchivePackage>,
    #[serde(default)]
    pub update: BTreeMap<String, UpdatePackages>,
    #[serde(default)]
    pub decompressed_path: Option<String>,
    #[serde(default)]
    pub chunk: Option<ChunkInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// The complete game in one archive.
    Game,
    /// One volume of a split game archive.
    GameSegment,
    Voice,
    /// Game update from an older version.
    Update,
    /// Voice update from an older version.
    VoiceUpdate,
}

impl ArchiveKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArchiveKind::Game => "game",
            ArchiveKind::GameSegment => "game segment",
            ArchiveKind::Voice => "voice",
            ArchiveKind::Update => "update",
            ArchiveKind::VoiceUpdate => "voice update",
        }
    }
}

/// A flattened archive listing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogArchive {
    pub kind: ArchiveKind,
    /// Source version for update archives.
    pub from_version: Option<String>,
    pub package: ArchivePackage,
}

impl VersionEntry {
    /// Full game archive, its segments, then voice packs.
    pub fn game_archives(&self) -> Vec<CatalogArchive> {
        let full = self.game.full.iter().map(|p| (ArchiveKind::Game, p));
        let segments = self.game.segments.iter().map(|p| (ArchiveKind::GameSegment, p));
        let voices = self.voice.values().map(|p| (ArchiveKind::Voice, p));
        full.chain(segments)
            .chain(voices)
            .map(|(kind, package)| CatalogArchive {
                kind,
                from_version: None,
                package: package.clone(),
            })
            .collect()
    }

    /// Update archives for every source version, game archive before voices.
    pub fn update_archives(&self) -> Vec<CatalogArchive> {
        let mut archives = Vec::new();
        for (from, packages) in &self.update {
            if let Some(game) = &packages.game {
                archives.push(CatalogArchive {
                    kind: ArchiveKind::Update,
                    from_version: Some(from.clone()),
                    package: game.clone(),
                });
            }
            for voice in packages.voice.values() {
                archives.push(CatalogArchive {
                    kind: ArchiveKind::VoiceUpdate,
                    from_version: Some(from.clone()),
                    package: voice.clone(),
                });
            }
        }
        archives
    }

    /// Base URL that decompressed file names resolve against.
    pub fn decompressed_base(&self) -> Option<&str> {
        self.decompressed_path
            .as_deref()
            .map(|p| p.trim_end_matches('/'))
            .filter(|p| !p.is_empty())
    }
}

/// All published versions of one game, newest first.
#[derive(Debug, Clone)]
pub struct VersionCatalog {
    game: GameId,
    versions: Vec<(GameVersion, VersionEntry)>,
}

impl VersionCatalog {
    pub fn parse(game: GameId, bytes: &[u8]) -> CatalogResult<Self> {
        let raw: BTreeMap<String, VersionEntry> =
            serde_json::from_slice(bytes).map_err(|e| CatalogError::Malformed {
                game,
                reason: e.to_string(),
            })?;

        let mut versions = raw
            .into_iter()
            .map(|(tag, entry)| {
                GameVersion::parse(&tag)
                    .map(|v| (v, entry))
                    .ok_or(CatalogError::InvalidVersion { game, version: tag })
            })
            .collect::<CatalogResult<Vec<_>>>()?;
        versions.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(Self { game, versions })
    }

    pub fn game(&self) -> GameId {
        self.game
    }

    /// Versions, newest first.
    pub fn versions(&self) -> impl Iterator<Item = &GameVersion> {
        self.versions.iter().map(|(v, _)| v)
    }

    pub fn latest(&self) -> Option<&GameVersion> {
        self.versions.first().map(|(v, _)| v)
    }

    pub fn entry(&self, version: &str) -> Option<&VersionEntry> {
        self.versions
            .iter()
            .find(|(v, _)| v.as_str() == version)
            .map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

fn size_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
