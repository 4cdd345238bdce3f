//! Page content fetching with timeout and bounded retry
//!
//! Every outcome is normalized into a [`FetchResult`] whose `html` can always
//! be rendered: either the page content or an inline error fragment that
//! replaces it. Failures never escape as errors.
//!
//! # Retry policy
//!
//! ```text
//! response, non-2xx       → fail now   (the server answered; retrying won't help)
//! abort / timeout         → fail now   (the full timeout budget is already spent)
//! other transport failure → wait retry_delay, try again, at most max_retries times
//! ```

pub mod transport;

use std::fmt;
use std::time::Duration;

use crate::util::escape_html;

pub use transport::{HttpResponse, ReqwestTransport, Transport, TransportError};

/// Default time budget for one content request, body included
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default pause before retrying after a network error
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_500);

/// Retries after the first attempt (two attempts total)
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Identifies which page's content to fetch. Fixed for the document's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    pub slug: String,
    /// Path prefix the dashboard is mounted under ("" when at the root)
    pub base_path: String,
}

impl PageDescriptor {
    pub fn new(slug: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            base_path: base_path.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn content_path(&self) -> String {
        format!("{}/api/pages/{}/content/", self.base_path, self.slug)
    }

    pub fn widget_path(&self, widget_id: &str) -> String {
        format!("{}/api/widgets/{}/", self.base_path, widget_id)
    }
}

/// Why a content fetch failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered with a non-2xx status
    Status(u16),
    /// The request was aborted or ran out of time
    Cancelled,
    /// Transport failure before any response
    Network(String),
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Inline markup shown in place of the page content
    pub fn to_fragment(&self) -> String {
        let message = match self {
            Self::Status(status) => format!("Failed to load ({}).", status),
            Self::Cancelled => "Request was cancelled.".to_string(),
            Self::Network(msg) if msg.trim().is_empty() => "Network error.".to_string(),
            Self::Network(msg) => escape_html(msg),
        };
        format!(
            r#"<div class="widget-content padding-inline-widget" style="color: var(--color-negative);">{} <a href="javascript:location.reload()">Reload</a>.</div>"#,
            message
        )
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "HTTP status {}", status),
            Self::Cancelled => write!(f, "Request was cancelled"),
            Self::Network(msg) => write!(f, "Network error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<TransportError> for FetchError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Aborted(_) => Self::Cancelled,
            TransportError::Network(msg) => Self::Network(msg),
        }
    }
}

/// Renderable fetch outcome. `ok == false` results must never be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub html: String,
    pub ok: bool,
}

impl FetchResult {
    fn success(html: String) -> Self {
        Self { html, ok: true }
    }

    fn failure(error: &FetchError) -> Self {
        Self {
            html: error.to_fragment(),
            ok: false,
        }
    }
}

/// Fetches page content over a [`Transport`]
pub struct ContentFetcher<T> {
    transport: T,
    timeout: Duration,
    retry_delay: Duration,
    max_retries: u32,
}

impl<T: Transport> ContentFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            timeout: DEFAULT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, delay: Duration, max_retries: u32) -> Self {
        self.retry_delay = delay;
        self.max_retries = max_retries;
        self
    }

    /// Fetch the page's content, starting from attempt 0
    pub async fn fetch(&self, page: &PageDescriptor) -> FetchResult {
        self.fetch_from_attempt(page, 0).await
    }

    /// Fetch the page's content with `attempt` attempts already spent
    pub async fn fetch_from_attempt(&self, page: &PageDescriptor, mut attempt: u32) -> FetchResult {
        loop {
            match self.attempt(page).await {
                Ok(html) => {
                    tracing::debug!(slug = %page.slug, attempt, bytes = html.len(), "Page content fetched");
                    return FetchResult::success(html);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    tracing::warn!(
                        slug = %page.slug,
                        attempt,
                        "Content fetch failed ({}), retrying in {:?}",
                        e,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(slug = %page.slug, attempt, "Content fetch failed: {}", e);
                    return FetchResult::failure(&e);
                }
            }
        }
    }

    /// One request. Dropping the transport future on timeout cancels it.
    async fn attempt(&self, page: &PageDescriptor) -> Result<String, FetchError> {
        let path = page.content_path();
        let response = match tokio::time::timeout(self.timeout, self.transport.get(&path, None)).await
        {
            Err(_elapsed) => return Err(FetchError::Cancelled),
            Ok(result) => result?,
        };

        if !response.is_success() {
            return Err(FetchError::Status(response.status));
        }
        Ok(response.body)
    }
}
