//! Supported games and the identity of one manifest universe.
//!
//! A [`GameTarget`] names exactly one set of published manifests: a game, a
//! release branch and a version tag. Voice packs are selected separately via
//! [`LocaleSelection`], since each game publishes its own set of locales.

mod locale;
mod version;

pub use locale::{LocaleSelection, VoiceLocale};
pub use version::GameVersion;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Branch name used when a caller does not ask for a specific one.
pub const DEFAULT_BRANCH: &str = "main";

/// Error returned when a game code is not one of the supported games.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown game code: {0}")]
pub struct UnknownGame(pub String);

/// The closed set of games whose manifests the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GameId {
    /// Genshin Impact (`hk4e`).
    Genshin,
    /// Honkai: Star Rail (`hkrpg`).
    StarRail,
    /// Zenless Zone Zero (`nap`).
    ZenlessZoneZero,
    /// Honkai Impact 3rd (`bh3`).
    Honkai3rd,
}

impl GameId {
    /// Every supported game, in the order they are presented to users.
    pub const ALL: [GameId; 4] = [
        GameId::Genshin,
        GameId::StarRail,
        GameId::ZenlessZoneZero,
        GameId::Honkai3rd,
    ];

    /// Short code used in manifest URLs.
    pub fn code(&self) -> &'static str {
        match self {
            GameId::Genshin => "hk4e",
            GameId::StarRail => "hkrpg",
            GameId::ZenlessZoneZero => "nap",
            GameId::Honkai3rd => "bh3",
        }
    }

    /// Human-readable title.
    pub fn display_name(&self) -> &'static str {
        match self {
            GameId::Genshin => "Genshin Impact",
            GameId::StarRail => "Honkai: Star Rail",
            GameId::ZenlessZoneZero => "Zenless Zone Zero",
            GameId::Honkai3rd => "Honkai Impact 3rd",
        }
    }

    /// Voice locales published as separate manifests for this game.
    pub fn voice_locales(&self) -> &'static [VoiceLocale] {
        match self {
            GameId::Genshin | GameId::ZenlessZoneZero => &VoiceLocale::ALL,
            GameId::StarRail | GameId::Honkai3rd => &[],
        }
    }

    /// Whether this game publishes a voice manifest for `locale`.
    pub fn supports_locale(&self, locale: VoiceLocale) -> bool {
        self.voice_locales().contains(&locale)
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for GameId {
    type Err = UnknownGame;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        GameId::ALL
            .into_iter()
            .find(|g| g.code() == code)
            .ok_or_else(|| UnknownGame(s.to_string()))
    }
}

/// One manifest universe: game, branch and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GameTarget {
    /// The game.
    pub game: GameId,
    /// Release branch (`main` unless a pre-download or beta branch is wanted).
    pub branch: String,
    /// Version tag exactly as published, e.g. `"5.0.0"`.
    pub version: String,
}

impl GameTarget {
    /// Target the default branch of `game` at `version`.
    pub fn new(game: GameId, version: impl Into<String>) -> Self {
        Self {
            game,
            branch: DEFAULT_BRANCH.to_string(),
            version: version.into(),
        }
    }

    /// Use a different release branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Whether this target is on the default branch.
    pub fn is_default_branch(&self) -> bool {
        self.branch == DEFAULT_BRANCH
    }
}

impl fmt::Display for GameTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.game, self.branch, self.version)
    }
}
