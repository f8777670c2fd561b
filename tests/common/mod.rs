//! Common test utilities
//!
//! Page builders matching the extractor's markup expectations, plus a
//! scripted navigator so walker and pool tests run without a network.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use magpie::config::RotationStrategy;
use magpie::crawler::{
    IdentityRotator, PageFetcher, PageNavigator, RenderedPage, RequestGate, RetryPolicy,
};
use magpie::crawler::identity::Identity;
use magpie::error::FetchError;

/// One scripted page-load response
#[allow(dead_code)]
pub enum Planned {
    Html(String),
    Timeout,
    Transient,
    Blocked(u16),
    NotFound,
    Fatal,
}

impl Planned {
    fn into_result(self, url: &str) -> Result<RenderedPage, FetchError> {
        match self {
            Planned::Html(html) => Ok(RenderedPage {
                url: url.to_string(),
                html,
            }),
            Planned::Timeout => Err(FetchError::Timeout),
            Planned::Transient => Err(FetchError::Transient("connection reset".to_string())),
            Planned::Blocked(status) => Err(FetchError::Blocked { status }),
            Planned::NotFound => Err(FetchError::NotFound),
            Planned::Fatal => Err(FetchError::Fatal("driver crashed".to_string())),
        }
    }
}

/// Navigator that replays scripted responses per URL.
///
/// Each call pops the next planned response for its URL; URLs with no
/// script (or an exhausted one) answer `NotFound`, matching a site that
/// has run out of review pages.
pub struct ScriptedNavigator {
    scripts: Mutex<HashMap<String, VecDeque<Planned>>>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedNavigator {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue one response for a URL; call repeatedly for sequences
    pub fn plan(self, url: &str, response: Planned) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// URLs navigated, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl PageNavigator for ScriptedNavigator {
    async fn navigate(&self, url: &str, _identity: &Identity) -> Result<RenderedPage, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());

        let planned = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front());

        match planned {
            Some(planned) => planned.into_result(url),
            None => Err(FetchError::NotFound),
        }
    }
}

/// Render one review cell in the markup shape the extractor expects
pub fn review_cell(title: &str, content: &str) -> String {
    format!(
        r#"<div class="comments-cell">
            <div class="comments-title-content">{title}</div>
            <i class="rating rating-4"></i>
            <div class="comments-name">Shopper</div>
            <div class="comments-text">3/15/2025 Ownership: 1 month to 1 year</div>
            <div class="comments-content">{content}</div>
          </div>"#
    )
}

/// Render a review page with `count` reviews named after `page`
#[allow(dead_code)]
pub fn review_page(page: u32, count: u32, has_next: bool) -> String {
    let cells: String = (1..=count)
        .map(|i| review_cell(&format!("Review p{page} #{i}"), "Pros: Good\nCons: None"))
        .collect();

    let pagination = if has_next {
        r#"<div class="paginations"><a class="paginations-next">Next</a></div>"#
    } else {
        r#"<div class="paginations"><a class="paginations-next is-disabled">Next</a></div>"#
    };

    format!("<html><body>{cells}{pagination}</body></html>")
}

/// Render page 1: product fields plus reviews
#[allow(dead_code)]
pub fn product_page(title: &str, review_count: u32, has_next: bool) -> String {
    let cells: String = (1..=review_count)
        .map(|i| review_cell(&format!("Review p1 #{i}"), "Pros: Good\nCons: None"))
        .collect();

    let pagination = if has_next {
        r#"<div class="paginations"><a class="paginations-next">Next</a></div>"#
    } else {
        r#"<div class="paginations"><a class="paginations-next is-disabled">Next</a></div>"#
    };

    format!(
        r#"<html><body>
          <h1 class="product-title">{title}</h1>
          <div class="product-breadcrumb"><a>Acme</a></div>
          <li class="price-current"><strong>199.99</strong></li>
          <i class="rating rating-4"></i>
          <span class="item-rating-num">(321)</span>
          <div class="product-bullets"><ul><li>Feature</li></ul></div>
          {cells}{pagination}
        </body></html>"#
    )
}

/// Fetcher over a scripted navigator with test-friendly timings
#[allow(dead_code)]
pub fn test_fetcher(navigator: Arc<ScriptedNavigator>) -> Arc<PageFetcher> {
    let gate = RequestGate::new(10_000.0, Duration::ZERO);
    let rotator = Arc::new(IdentityRotator::new(RotationStrategy::Sequential).unwrap());
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 4,
    };
    Arc::new(PageFetcher::new(navigator, gate, rotator, policy))
}

/// Stop channel defaulting to "keep going"
#[allow(dead_code)]
pub fn stop_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}
