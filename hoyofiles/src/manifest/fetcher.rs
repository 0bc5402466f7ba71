//! Manifest retrieval with mirror fallback and conditional revalidation.

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::try_join_all;
use tracing::{debug, warn};

use super::document::{DocumentKind, RawDocument};
use super::error::{FetchError, FetchResult};
use super::source::{ManifestSource, SourceResponse};
use crate::game::{GameId, GameTarget, LocaleSelection};
use crate::tree::join_url;

#[derive(Debug, Clone)]
struct CachedDocument {
    entity_tag: String,
    bytes: Bytes,
}

/// A document as served, with the URL that actually answered.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub url: String,
    pub bytes: Bytes,
    /// True when the server confirmed a cached copy instead of resending it.
    pub revalidated: bool,
}

/// Retrieves manifest documents from an ordered list of mirrors.
///
/// Mirrors are tried in order; only unreachable or timed-out sources fall
/// through to the next one. A `NotFound` is authoritative. Entity tags from
/// earlier responses are sent back so unchanged documents are not re-downloaded.
pub struct ManifestFetcher<S> {
    source: S,
    bases: Vec<String>,
    validators: DashMap<String, CachedDocument>,
}

impl<S: ManifestSource> ManifestFetcher<S> {
    pub fn new(source: S, bases: Vec<String>) -> Self {
        let bases = bases
            .into_iter()
            .map(|b| b.trim().trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty())
            .collect();
        Self {
            source,
            bases,
            validators: DashMap::new(),
        }
    }

    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Path of the version catalog relative to a base.
    pub fn version_list_path(game: GameId) -> String {
        format!("{}_versions.json", game.code())
    }

    /// Path of a document relative to a base.
    pub fn document_path(target: &GameTarget, kind: &DocumentKind) -> String {
        if target.is_default_branch() {
            format!("{}/{}/{}", target.game.code(), target.version, kind.file_name())
        } else {
            format!(
                "{}/{}/{}/{}",
                target.game.code(),
                target.branch,
                target.version,
                kind.file_name()
            )
        }
    }

    pub async fn fetch_version_list(&self, game: GameId) -> FetchResult<FetchedDocument> {
        self.fetch_path(&Self::version_list_path(game)).await
    }

    /// Fetch one manifest document of `target`.
    pub async fn fetch(&self, target: &GameTarget, kind: &DocumentKind) -> FetchResult<FetchedDocument> {
        self.fetch_path(&Self::document_path(target, kind)).await
    }

    /// Fetch the package index, one voice index per selected locale and, when
    /// `diff_base` is given, the diff index from that version.
    ///
    /// Entry URLs resolve against `object_base`; without one they resolve
    /// against the directory the package index was served from.
    pub async fn fetch_manifest_set(
        &self,
        target: &GameTarget,
        locales: &LocaleSelection,
        diff_base: Option<&str>,
        object_base: Option<&str>,
    ) -> FetchResult<Vec<RawDocument>> {
        let package = self.fetch(target, &DocumentKind::PackageIndex).await?;
        let object_base = match object_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => package
                .url
                .rsplit_once('/')
                .map(|(dir, _)| dir.to_string())
                .unwrap_or_else(|| package.url.clone()),
        };

        let mut voice_kinds = Vec::new();
        for locale in locales.iter() {
            if target.game.supports_locale(locale) {
                voice_kinds.push(DocumentKind::VoiceIndex(locale));
            } else {
                warn!(
                    game = %target.game,
                    locale = %locale,
                    "Game publishes no voice pack for this locale, skipping"
                );
            }
        }
        let voices = try_join_all(voice_kinds.iter().map(|kind| self.fetch(target, kind))).await?;

        let mut documents = Vec::with_capacity(voices.len() + 2);
        documents.push(RawDocument::new(
            target.clone(),
            DocumentKind::PackageIndex,
            object_base.clone(),
            package.bytes,
        ));
        for (kind, doc) in voice_kinds.into_iter().zip(voices) {
            documents.push(RawDocument::new(target.clone(), kind, object_base.clone(), doc.bytes));
        }

        if let Some(base_version) = diff_base {
            let kind = DocumentKind::DiffIndex {
                base_version: base_version.to_string(),
            };
            let doc = self.fetch(target, &kind).await?;
            documents.push(RawDocument::new(target.clone(), kind, object_base, doc.bytes));
        }

        debug!(target = %target, documents = documents.len(), "Fetched manifest set");
        Ok(documents)
    }

    /// Fetch a path from the first mirror that answers.
    pub async fn fetch_path(&self, relative: &str) -> FetchResult<FetchedDocument> {
        let mut last_error = None;
        for base in &self.bases {
            let url = join_url(base, relative);
            match self.fetch_url(&url).await {
                Ok(doc) => return Ok(doc),
                Err(e) if e.is_retryable() => {
                    warn!(url = %url, error = %e, "Manifest source failed, trying next mirror");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| FetchError::Unreachable {
            url: relative.to_string(),
            reason: "no manifest source configured".to_string(),
        }))
    }

    /// Drop every stored validator so the next fetches are unconditional.
    pub fn clear_validators(&self) {
        self.validators.clear();
    }

    async fn fetch_url(&self, url: &str) -> FetchResult<FetchedDocument> {
        let cached = self.validators.get(url).map(|entry| entry.value().clone());
        let tag = cached.as_ref().map(|c| c.entity_tag.as_str());

        match self.source.get(url, tag).await? {
            SourceResponse::Fresh { bytes, entity_tag } => {
                self.remember(url, entity_tag, &bytes);
                Ok(FetchedDocument {
                    url: url.to_string(),
                    bytes,
                    revalidated: false,
                })
            }
            SourceResponse::NotModified => match cached {
                Some(doc) => {
                    debug!(url = %url, "Manifest unchanged since last fetch");
                    Ok(FetchedDocument {
                        url: url.to_string(),
                        bytes: doc.bytes,
                        revalidated: true,
                    })
                }
                None => Err(FetchError::Unreachable {
                    url: url.to_string(),
                    reason: "server answered 304 to an unconditional request".to_string(),
                }),
            },
        }
    }

    fn remember(&self, url: &str, entity_tag: Option<String>, bytes: &Bytes) {
        match entity_tag {
            Some(entity_tag) => {
                self.validators.insert(
                    url.to_string(),
                    CachedDocument {
                        entity_tag,
                        bytes: bytes.clone(),
                    },
                );
            }
            None => {
                self.validators.remove(url);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::VoiceLocale;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory manifest source recording every request it receives.
    #[derive(Default)]
    pub(crate) struct MemorySource {
        pub(crate) responses: Mutex<HashMap<String, FetchResult<(Bytes, Option<String>)>>>,
        pub(crate) requests: Mutex<Vec<(String, Option<String>)>>,
    }

    impl MemorySource {
        pub(crate) fn serve(&self, url: &str, body: &str, tag: Option<&str>) {
            self.responses.lock().insert(
                url.to_string(),
                Ok((Bytes::from(body.to_string()), tag.map(str::to_string))),
            );
        }

        pub(crate) fn fail(&self, url: &str, err: FetchError) {
            self.responses.lock().insert(url.to_string(), Err(err));
        }
    }

    impl ManifestSource for MemorySource {
        async fn get(&self, url: &str, entity_tag: Option<&str>) -> FetchResult<SourceResponse> {
            self.requests
                .lock()
                .push((url.to_string(), entity_tag.map(str::to_string)));
            let response = self.responses.lock().get(url).cloned();
            match response {
                None => Err(FetchError::NotFound {
                    url: url.to_string(),
                }),
                Some(Err(e)) => Err(e),
                Some(Ok((bytes, tag))) => {
                    if tag.is_some() && tag.as_deref() == entity_tag {
                        Ok(SourceResponse::NotModified)
                    } else {
                        Ok(SourceResponse::Fresh {
                            bytes,
                            entity_tag: tag,
                        })
                    }
                }
            }
        }
    }

    fn fetcher(bases: &[&str]) -> ManifestFetcher<MemorySource> {
        ManifestFetcher::new(
            MemorySource::default(),
            bases.iter().map(|b| b.to_string()).collect(),
        )
    }

    #[test]
    fn test_document_paths() {
        let target = GameTarget::new(GameId::Genshin, "5.0.0");
        assert_eq!(
            ManifestFetcher::<MemorySource>::document_path(&target, &DocumentKind::PackageIndex),
            "hk4e/5.0.0/pkg_version"
        );
        let pre = target.with_branch("predownload");
        assert_eq!(
            ManifestFetcher::<MemorySource>::document_path(
                &pre,
                &DocumentKind::DiffIndex {
                    base_version: "4.8.0".into()
                }
            ),
            "hk4e/predownload/5.0.0/diff_4.8.0.json"
        );
        assert_eq!(
            ManifestFetcher::<MemorySource>::version_list_path(GameId::StarRail),
            "hkrpg_versions.json"
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_next_mirror_when_unreachable() {
        let fetcher = fetcher(&["https://primary/", "https://mirror"]);
        fetcher.source().fail(
            "https://primary/hk4e_versions.json",
            FetchError::Unreachable {
                url: "https://primary/hk4e_versions.json".into(),
                reason: "connection refused".into(),
            },
        );
        fetcher
            .source()
            .serve("https://mirror/hk4e_versions.json", "{}", None);

        let doc = fetcher.fetch_version_list(GameId::Genshin).await.unwrap();
        assert_eq!(doc.url, "https://mirror/hk4e_versions.json");
        assert_eq!(&doc.bytes[..], b"{}");
    }

    #[tokio::test]
    async fn test_not_found_does_not_fall_back() {
        let fetcher = fetcher(&["https://primary", "https://mirror"]);
        fetcher
            .source()
            .serve("https://mirror/hk4e_versions.json", "{}", None);

        let err = fetcher.fetch_version_list(GameId::Genshin).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
        assert_eq!(fetcher.source().requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_no_bases_is_unreachable() {
        let fetcher = fetcher(&["  "]);
        let err = fetcher.fetch_version_list(GameId::Genshin).await.unwrap_err();
        assert!(matches!(err, FetchError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_revalidates_with_entity_tag() {
        let fetcher = fetcher(&["https://primary"]);
        let url = "https://primary/hk4e_versions.json";
        fetcher.source().serve(url, "{\"v\":1}", Some("\"abc\""));

        let first = fetcher.fetch_version_list(GameId::Genshin).await.unwrap();
        assert!(!first.revalidated);

        let second = fetcher.fetch_version_list(GameId::Genshin).await.unwrap();
        assert!(second.revalidated);
        assert_eq!(second.bytes, first.bytes);

        let requests = fetcher.source().requests.lock().clone();
        assert_eq!(requests[0].1, None);
        assert_eq!(requests[1].1.as_deref(), Some("\"abc\""));
    }

    #[tokio::test]
    async fn test_manifest_set_fetches_only_selected_supported_locales() {
        let fetcher = fetcher(&["https://primary"]);
        let target = GameTarget::new(GameId::Genshin, "5.0.0");
        fetcher
            .source()
            .serve("https://primary/hk4e/5.0.0/pkg_version", "", None);
        fetcher.source().serve(
            "https://primary/hk4e/5.0.0/Audio_English(US)_pkg_version",
            "",
            None,
        );

        let locales: LocaleSelection = [VoiceLocale::English].into_iter().collect();
        let docs = fetcher
            .fetch_manifest_set(&target, &locales, None, None)
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].kind, DocumentKind::PackageIndex);
        assert_eq!(docs[0].object_base, "https://primary/hk4e/5.0.0");
        assert_eq!(docs[1].kind, DocumentKind::VoiceIndex(VoiceLocale::English));
        assert_eq!(fetcher.source().requests.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_manifest_set_skips_unsupported_locale_and_fetches_diff() {
        let fetcher = fetcher(&["https://primary"]);
        let target = GameTarget::new(GameId::StarRail, "2.0.0");
        fetcher
            .source()
            .serve("https://primary/hkrpg/2.0.0/pkg_version", "", None);
        fetcher
            .source()
            .serve("https://primary/hkrpg/2.0.0/diff_1.6.0.json", "{}", None);

        let locales: LocaleSelection = [VoiceLocale::Japanese].into_iter().collect();
        let docs = fetcher
            .fetch_manifest_set(&target, &locales, Some("1.6.0"), Some("https://objects/2.0/"))
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].object_base, "https://objects/2.0");
        assert_eq!(
            docs[1].kind,
            DocumentKind::DiffIndex {
                base_version: "1.6.0".into()
            }
        );
    }
}
