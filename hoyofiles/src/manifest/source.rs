//! Manifest sources.
//!
//! The fetcher talks to a [`ManifestSource`] rather than to reqwest directly
//! so that tests can serve documents from memory.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;

use super::error::{FetchError, FetchResult};

/// Outcome of a (possibly conditional) manifest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceResponse {
    /// New content, with the validator to send next time if the server gave one.
    Fresh {
        bytes: Bytes,
        entity_tag: Option<String>,
    },
    /// The content is unchanged since the validator was issued.
    NotModified,
}

/// Something that serves manifest documents by URL.
pub trait ManifestSource: Send + Sync {
    /// Fetch `url`, sending `entity_tag` as a conditional validator if given.
    fn get(
        &self,
        url: &str,
        entity_tag: Option<&str>,
    ) -> impl Future<Output = FetchResult<SourceResponse>> + Send;
}

/// HTTP manifest source backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpManifestSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpManifestSource {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hoyofiles/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Unreachable {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

impl ManifestSource for HttpManifestSource {
    async fn get(&self, url: &str, entity_tag: Option<&str>) -> FetchResult<SourceResponse> {
        let mut request = self.client.get(url);
        if let Some(tag) = entity_tag {
            request = request.header(IF_NONE_MATCH, tag);
        }

        let response = request.send().await.map_err(|e| self.classify(url, e))?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(SourceResponse::NotModified);
        }
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(FetchError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Unreachable {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let entity_tag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| self.classify(url, e))?;
        Ok(SourceResponse::Fresh { bytes, entity_tag })
    }
}
