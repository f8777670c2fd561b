//! Page fetcher with rate limiting, identity rotation and retry
//!
//! One `fetch` call performs bounded page-load attempts through the
//! navigator collaborator. Every attempt passes the shared request gate
//! and presents a freshly rotated identity. Only `Timeout` and
//! `Transient` failures are retried, with exponential backoff; the
//! remaining classes are policy signals that propagate to the walker
//! unchanged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::crawler::identity::IdentityRotator;
use crate::crawler::limiter::RequestGate;
use crate::crawler::navigator::{PageNavigator, RenderedPage};
use crate::error::FetchError;

/// Retry policy for transient page-load failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts per page (first try included)
    pub max_attempts: u32,

    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,

    /// Cap on the backoff delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before the given retry attempt (1-based)
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
        Duration::from_millis(exponential.min(self.max_delay_ms))
    }
}

/// Fetches rendered pages through the rate gate with rotated identities
pub struct PageFetcher {
    navigator: Arc<dyn PageNavigator>,
    gate: Arc<RequestGate>,
    rotator: Arc<IdentityRotator>,
    policy: RetryPolicy,
    /// Retry attempts issued over this fetcher's lifetime
    retries: AtomicU64,
}

impl PageFetcher {
    pub fn new(
        navigator: Arc<dyn PageNavigator>,
        gate: Arc<RequestGate>,
        rotator: Arc<IdentityRotator>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            navigator,
            gate,
            rotator,
            policy,
            retries: AtomicU64::new(0),
        }
    }

    /// Total retry attempts issued so far, across all pages
    pub fn retry_count(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Fetch one page, retrying transient failures with backoff.
    ///
    /// `Blocked`, `NotFound` and `Fatal` propagate on the first
    /// occurrence; exhausted retries surface as `MaxRetriesExceeded`.
    pub async fn fetch(&self, url: &str) -> Result<RenderedPage, FetchError> {
        let mut last_error: Option<FetchError> = None;

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                self.retries.fetch_add(1, Ordering::Relaxed);
                let delay = self.policy.delay_for(attempt - 1);
                tracing::debug!(
                    url = %url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying page fetch after backoff"
                );
                tokio::time::sleep(delay).await;
            }

            // No request bypasses the gate, retries included
            self.gate.acquire().await;

            let identity = self.rotator.next_identity();
            tracing::debug!(url = %url, user_agent = identity.user_agent, "Loading page");

            match self.navigator.navigate(url, &identity).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        url = %url,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Transient page-load failure"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| String::from("no attempts made"));
        Err(FetchError::MaxRetriesExceeded(detail))
    }
}
