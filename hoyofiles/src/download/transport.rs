//! Byte transport for object downloads.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::RANGE;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("transfer from {url} was interrupted: {reason}")]
    Interrupted { url: String, reason: String },
}

impl TransportError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Timeout { .. }
            | TransportError::Connection { .. }
            | TransportError::Interrupted { .. } => true,
            TransportError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
        }
    }
}

/// An open response body.
pub struct TransportResponse {
    /// True when the server honored the requested offset (HTTP 206).
    pub resumed: bool,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, TransportError>>,
}

/// Opens object bodies by URL, optionally starting at a byte offset.
pub trait Transport: Send + Sync + 'static {
    /// Request `url` from `offset`; an offset of zero requests the whole object.
    fn open(
        &self,
        url: &str,
        offset: u64,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// reqwest-backed transport.
///
/// Only the connect phase has a hard timeout here; stalled bodies are
/// detected by the orchestrator's idle timeout so large objects are not cut
/// off by a whole-request deadline.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("hoyofiles/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(url: &str, err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_body() || err.is_decode() {
        TransportError::Interrupted {
            url: url.to_string(),
            reason: err.to_string(),
        }
    } else {
        TransportError::Connection {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

impl Transport for HttpTransport {
    async fn open(&self, url: &str, offset: u64) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }

        let response = request.send().await.map_err(|e| classify(url, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let resumed = offset > 0 && status == StatusCode::PARTIAL_CONTENT;
        let content_length = response.content_length();
        let owned_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| classify(&owned_url, &e)))
            .boxed();

        Ok(TransportResponse {
            resumed,
            content_length,
            body,
        })
    }
}
