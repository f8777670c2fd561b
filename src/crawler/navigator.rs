//! Page navigation boundary
//!
//! The browser-automation collaborator is consumed through the
//! [`PageNavigator`] trait: one call, one rendered page or a classified
//! failure. The shipped implementation drives plain HTTP via reqwest;
//! tests substitute scripted navigators.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

use crate::crawler::identity::Identity;
use crate::error::FetchError;

/// Rendered content of one page load
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Final URL after redirects
    pub url: String,
    /// Rendered document body
    pub html: String,
}

/// A single page-load attempt through the automation collaborator.
///
/// Implementations classify failures into the [`FetchError`] taxonomy;
/// retry policy lives in the fetcher, not here.
#[async_trait]
pub trait PageNavigator: Send + Sync {
    async fn navigate(&self, url: &str, identity: &Identity) -> Result<RenderedPage, FetchError>;
}

/// Body substrings that indicate an anti-bot challenge on a 200 response
const CHALLENGE_MARKERS: &[&str] = &[
    "Are you a human",
    "captcha",
    "Access Denied",
    "unusual traffic",
];

/// HTTP-backed navigator
pub struct HttpNavigator {
    client: Client,

    /// Optional base URL prefix for testing against mock servers
    base_url: Option<String>,
}

impl HttpNavigator {
    /// Create a navigator with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .cookie_store(true)
            .build()
            .map_err(|e| FetchError::Fatal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: None,
        })
    }

    /// Create a navigator that prefixes all URLs, for mock-server tests
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let mut navigator = Self::new(timeout)?;
        navigator.base_url = Some(base_url.to_string());
        Ok(navigator)
    }

    /// Classify a response status into the fetch taxonomy
    fn classify_status(status: u16) -> Option<FetchError> {
        match status {
            200..=299 => None,
            404 | 410 => Some(FetchError::NotFound),
            403 => Some(FetchError::Blocked { status }),
            429 | 500 | 502 | 503 | 504 => {
                Some(FetchError::Transient(format!("server returned {status}")))
            }
            _ => Some(FetchError::Fatal(format!("unexpected status {status}"))),
        }
    }

    /// Detect an anti-bot challenge served with a success status
    fn is_challenge(body: &str) -> bool {
        // Challenge interstitials are short; avoid scanning full review
        // pages. The cutoff backs up to a char boundary so multi-byte
        // content straddling it cannot split a character.
        let mut end = body.len().min(4096);
        while end > 0 && !body.is_char_boundary(end) {
            end -= 1;
        }
        let head = body[..end].to_lowercase();
        CHALLENGE_MARKERS
            .iter()
            .any(|marker| head.contains(&marker.to_lowercase()))
    }

    /// Build headers presenting the given identity
    fn build_headers(identity: &Identity) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(identity.user_agent));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(identity.accept_language),
        );
        if let Ok(value) = HeaderValue::from_str(identity.sec_ch_ua) {
            headers.insert("Sec-Ch-Ua", value);
        }
        if let Ok(value) = HeaderValue::from_str(identity.sec_ch_ua_platform) {
            headers.insert("Sec-Ch-Ua-Platform", value);
        }

        headers
    }
}

#[async_trait]
impl PageNavigator for HttpNavigator {
    async fn navigate(&self, url: &str, identity: &Identity) -> Result<RenderedPage, FetchError> {
        let full_url = if let Some(base) = &self.base_url {
            format!("{base}{url}")
        } else {
            url.to_string()
        };

        // Malformed URLs are fatal, never retried
        url::Url::parse(&full_url).map_err(|e| FetchError::Fatal(format!("invalid URL: {e}")))?;

        let headers = Self::build_headers(identity);

        let response = self
            .client
            .get(&full_url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else if e.is_connect() || e.is_request() {
                    FetchError::Transient(e.to_string())
                } else {
                    FetchError::Fatal(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if let Some(err) = Self::classify_status(status) {
            return Err(err);
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Transient(format!("failed to read body: {e}"))
            }
        })?;

        if Self::is_challenge(&html) {
            return Err(FetchError::Blocked { status });
        }

        Ok(RenderedPage {
            url: final_url,
            html,
        })
    }
}
