//! HTTP transport boundary
//!
//! The fetcher and the widget controller only ever issue `GET` requests for a
//! path under the dashboard server and read the whole body as text. That
//! contract is the [`Transport`] trait; [`ReqwestTransport`] is the real one.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;

/// A fully read HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure before a response was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request was aborted or timed out
    Aborted(String),
    /// DNS, connection refused or timed out, reset, TLS...
    Network(String),
}

impl TransportError {
    /// Classify a failure message. Messages that talk about aborting or
    /// cancelling count as aborts; everything else is a network error.
    pub fn from_message(message: impl Into<String>) -> Self {
        static ABORT_PATTERN: OnceLock<Regex> = OnceLock::new();
        let message = message.into();
        let pattern = ABORT_PATTERN.get_or_init(|| {
            Regex::new(r"(?i)abort|cancel+ed|timed out").expect("static regex is valid")
        });
        if pattern.is_match(&message) {
            Self::Aborted(message)
        } else {
            Self::Network(message)
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted(msg) => write!(f, "Request aborted: {}", msg),
            Self::Network(msg) => write!(f, "Network error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Issues GET requests against the dashboard server
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// GET `path` (absolute path on the server, e.g. `/api/pages/home/content/`)
    async fn get(&self, path: &str, accept: Option<&str>) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport> Transport for &T {
    async fn get(&self, path: &str, accept: Option<&str>) -> Result<HttpResponse, TransportError> {
        (**self).get(path, accept).await
    }
}

/// reqwest-backed transport rooted at a server origin
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    origin: String,
}

impl ReqwestTransport {
    /// `origin` is scheme + host (+ port), e.g. `http://127.0.0.1:8080`
    pub fn new(origin: &str) -> Result<Self> {
        // No overall timeout here: the content fetcher owns cancellation and
        // widget refreshes deliberately have none.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    fn classify(e: reqwest::Error) -> TransportError {
        classify_failure(e.is_connect(), e.is_timeout(), e.to_string())
    }
}

/// A connect failure is a network error even when it is the connect timeout
/// firing; only timeouts after the connection was made count as aborts.
fn classify_failure(is_connect: bool, is_timeout: bool, message: String) -> TransportError {
    if is_connect {
        TransportError::Network(message)
    } else if is_timeout {
        TransportError::Aborted(message)
    } else {
        TransportError::from_message(message)
    }
}

impl Transport for ReqwestTransport {
    async fn get(&self, path: &str, accept: Option<&str>) -> Result<HttpResponse, TransportError> {
        let url = self.url(path);
        tracing::trace!(%url, "GET");

        let mut request = self.client.get(&url);
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }

        let response = request.send().await.map_err(Self::classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(Self::classify)?;

        Ok(HttpResponse { status, body })
    }
}
