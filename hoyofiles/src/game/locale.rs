//! Voice-pack locales.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when a locale name or code is not recognized.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown voice locale: {0}")]
pub struct UnknownLocale(pub String);

/// A voice-pack language published as its own manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VoiceLocale {
    Chinese,
    English,
    Japanese,
    Korean,
}

impl VoiceLocale {
    /// All locales any game may publish.
    pub const ALL: [VoiceLocale; 4] = [
        VoiceLocale::Chinese,
        VoiceLocale::English,
        VoiceLocale::Japanese,
        VoiceLocale::Korean,
    ];

    /// Two-letter code.
    pub fn code(&self) -> &'static str {
        match self {
            VoiceLocale::Chinese => "zh",
            VoiceLocale::English => "en",
            VoiceLocale::Japanese => "ja",
            VoiceLocale::Korean => "ko",
        }
    }

    /// Directory name the publisher uses for this locale's audio assets.
    pub fn asset_dir(&self) -> &'static str {
        match self {
            VoiceLocale::Chinese => "Chinese",
            VoiceLocale::English => "English(US)",
            VoiceLocale::Japanese => "Japanese",
            VoiceLocale::Korean => "Korean",
        }
    }

    /// Name of the voice index document for this locale.
    pub fn manifest_name(&self) -> String {
        format!("Audio_{}_pkg_version", self.asset_dir())
    }
}

impl fmt::Display for VoiceLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for VoiceLocale {
    type Err = UnknownLocale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        VoiceLocale::ALL
            .into_iter()
            .find(|l| {
                l.code().eq_ignore_ascii_case(needle) || l.asset_dir().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| UnknownLocale(s.to_string()))
    }
}

/// The set of voice locales a request wants; empty means "no voice packs".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LocaleSelection(BTreeSet<VoiceLocale>);

impl LocaleSelection {
    /// An empty selection.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every locale `game` publishes.
    pub fn all_for(game: super::GameId) -> Self {
        game.voice_locales().iter().copied().collect()
    }

    pub fn insert(&mut self, locale: VoiceLocale) -> bool {
        self.0.insert(locale)
    }

    pub fn contains(&self, locale: VoiceLocale) -> bool {
        self.0.contains(&locale)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Locales in stable order.
    pub fn iter(&self) -> impl Iterator<Item = VoiceLocale> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<VoiceLocale> for LocaleSelection {
    fn from_iter<I: IntoIterator<Item = VoiceLocale>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
