//! Page fetching
//!
//! This module defines the page-fetch collaborator the engine dispatches to,
//! plus the HTTP implementation used by the binary:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with a per-request timeout
//! - Treating anti-bot status codes as blocking signals
//! - Error classification

use crate::classifier::StructuralSignals;
use crate::config::{Config, UserAgentConfig};
use crate::crawler::parser::{parse_page, ExtractedLink, ParseOptions};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed for one page
const MAX_REDIRECTS: usize = 10;

/// Errors a page fetch can end with
///
/// A blocking page is not an error: it comes back as a [`FetchedPage`] with
/// `blocking_signal_detected` set.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch of {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} is not HTML (Content-Type: {content_type})")]
    ContentMismatch { url: String, content_type: String },

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
}

/// What a successful fetch hands back to the engine
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: String,
    pub links: Vec<ExtractedLink>,
    pub signals: StructuralSignals,
    pub blocking_signal_detected: bool,
}

impl FetchedPage {
    /// A page that only says "you are blocked"
    pub fn blocked(final_url: impl Into<String>) -> Self {
        Self {
            final_url: final_url.into(),
            blocking_signal_detected: true,
            ..Self::default()
        }
    }
}

/// The page-fetch collaborator
///
/// Implementations must resolve exactly once per call and give up after
/// `timeout`. The engine additionally bounds every call with its own timer.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use harvest_engine::config::UserAgentConfig;
/// use harvest_engine::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "HarvestEngine".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "ops@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages over HTTP and parses them with `scraper`
pub struct HttpPageFetcher {
    client: Client,
    options: ParseOptions,
}

impl HttpPageFetcher {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(&config.user_agent)?,
            options: ParseOptions::from_config(&config.crawler, &config.target),
        })
    }
}

/// Status codes anti-bot layers answer with
fn is_blocking_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// Rate-limit headers that mean "back off" even on a 2xx response
fn has_blocking_headers(headers: &HeaderMap) -> bool {
    let exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    exhausted || headers.contains_key(RETRY_AFTER)
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_redirect() {
        FetchError::Navigation {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    /// Fetches a URL and extracts links and structural signals
    ///
    /// # Response Handling
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | HTTP 429, 403, 503 | Blocking page |
    /// | `Retry-After` or `X-RateLimit-Remaining: 0` | Blocking page |
    /// | Other non-2xx | `FetchError::Status` |
    /// | Non-HTML Content-Type | `FetchError::ContentMismatch` |
    /// | Timeout | `FetchError::Timeout` |
    /// | Redirect loop or chain > 10 | `FetchError::Navigation` |
    /// | Connection/TLS failure | `FetchError::Http` |
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        let final_url = response.url().clone();

        if is_blocking_status(status) {
            tracing::debug!(url, status = status.as_u16(), "Blocking status");
            return Ok(FetchedPage::blocked(final_url.as_str()));
        }

        if has_blocking_headers(response.headers()) {
            tracing::debug!(url, "Rate-limit headers present");
            return Ok(FetchedPage::blocked(final_url.as_str()));
        }

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.contains("text/html") {
            return Err(FetchError::ContentMismatch {
                url: url.to_string(),
                content_type,
            });
        }

        let body = response.text().await.map_err(|e| classify_error(url, e))?;
        Ok(build_page(&body, final_url, &self.options))
    }
}

fn build_page(body: &str, final_url: Url, options: &ParseOptions) -> FetchedPage {
    let parsed = parse_page(body, &final_url, options);
    FetchedPage {
        final_url: final_url.to_string(),
        links: parsed.links,
        signals: parsed.signals,
        blocking_signal_detected: parsed.blocking_signal_detected,
    }
}
