//! Pagination walker state machine
//!
//! One walker drives the review pages of a single product strictly in
//! ascending page order:
//!
//! ```text
//! Start → FetchingPage(n) → Extracting(n) → Deciding → FetchingPage(n+1)
//!                 │                             │
//!                 │                             └──→ Done
//!                 └──→ Done (NotFound) / Aborted (Blocked, Fatal)
//! ```
//!
//! Both terminal states yield whatever records were collected, so an
//! aborted walk still persists pages 1..n-1.

use std::sync::Arc;

use tokio::sync::watch;

use crate::crawler::fetcher::PageFetcher;
use crate::crawler::navigator::RenderedPage;
use crate::error::FetchError;
use crate::models::{WalkOutcome, WalkStatus};
use crate::parser::ReviewExtractor;

/// Safety ceiling on pages per product, independent of the user cap.
/// Bounds unbounded (cap = 0) walks against sites that keep serving
/// "next" pages forever.
pub const HARD_PAGE_CEILING: u32 = 500;

/// Walker states; `Done` and `Aborted` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerState {
    Start,
    FetchingPage(u32),
    Extracting(u32),
    Deciding(u32),
    Done,
    Aborted,
}

/// Decision taken after extracting page `n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NextPage(u32),
    Finished,
}

/// Decide whether to continue past page `n`.
///
/// Total over all inputs: the user cap (when set), a last-page signal
/// from the extractor, and the hard ceiling each end the walk.
pub fn decide(current_page: u32, cap: Option<u32>, last_page_seen: bool) -> Decision {
    let next = current_page + 1;

    if last_page_seen {
        return Decision::Finished;
    }
    if let Some(cap) = cap {
        if next > cap {
            return Decision::Finished;
        }
    }
    if next > HARD_PAGE_CEILING {
        return Decision::Finished;
    }

    Decision::NextPage(next)
}

/// Build the URL for review page `n` of a product.
///
/// Page 1 is the product page itself; later pages address the review
/// pagination directly.
pub fn review_page_url(product_url: &str, page: u32) -> String {
    if page <= 1 {
        product_url.to_string()
    } else if product_url.contains('?') {
        format!("{product_url}&page={page}")
    } else {
        format!("{product_url}?page={page}")
    }
}

/// Per-product pagination walker
pub struct PageWalker {
    fetcher: Arc<PageFetcher>,
    extractor: Arc<ReviewExtractor>,
    /// User-configured cap; `None` walks to the natural end
    page_cap: Option<u32>,
    /// Caller-initiated stop signal; checked before every fetch
    stop: watch::Receiver<bool>,
}

impl PageWalker {
    pub fn new(
        fetcher: Arc<PageFetcher>,
        extractor: Arc<ReviewExtractor>,
        page_cap: Option<u32>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            page_cap,
            stop,
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Walk all review pages of one product to a terminal state.
    ///
    /// Never fails: fetch failures decide the terminal state and the
    /// outcome carries whatever was collected up to that point.
    pub async fn run(&self, product_url: &str) -> WalkOutcome {
        let mut outcome = WalkOutcome {
            product_url: product_url.to_string(),
            status: WalkStatus::Complete,
            product: None,
            reviews: Vec::new(),
            pages_visited: 0,
            extraction_skips: 0,
            abort_reason: None,
        };

        // A URL without an item number cannot key any record
        let item_number = match self.extractor.extract_item_number(product_url) {
            Ok(item) => item,
            Err(e) => {
                tracing::error!(url = %product_url, error = %e, "Cannot derive item number");
                outcome.status = WalkStatus::Aborted;
                outcome.abort_reason = Some(e.to_string());
                return outcome;
            }
        };

        let mut state = WalkerState::Start;
        let mut pending: Option<RenderedPage> = None;
        let mut last_page_seen = false;

        loop {
            state = match state {
                WalkerState::Start => WalkerState::FetchingPage(1),

                WalkerState::FetchingPage(n) => {
                    if self.stop_requested() {
                        tracing::info!(url = %product_url, page = n, "Stop requested, ending walk");
                        WalkerState::Done
                    } else {
                        let page_url = review_page_url(product_url, n);
                        match self.fetcher.fetch(&page_url).await {
                            Ok(page) => {
                                pending = Some(page);
                                WalkerState::Extracting(n)
                            }
                            // Fewer pages exist than the cap: natural end
                            Err(FetchError::NotFound) => {
                                tracing::debug!(url = %product_url, page = n, "No more review pages");
                                WalkerState::Done
                            }
                            Err(e) => {
                                tracing::warn!(
                                    url = %product_url,
                                    page = n,
                                    error = %e,
                                    "Aborting walk, keeping collected pages"
                                );
                                outcome.abort_reason = Some(e.to_string());
                                WalkerState::Aborted
                            }
                        }
                    }
                }

                WalkerState::Extracting(n) => {
                    let page = pending.take().expect("page fetched before extracting");
                    let extracted = self.extractor.extract(&page, n, &item_number);

                    if let Some(product) = extracted.product {
                        outcome.product = Some(product);
                    }
                    outcome.extraction_skips += extracted.skipped;

                    if extracted.reviews.is_empty() && n > 1 {
                        // An empty review page past page 1 is the end of
                        // pagination, same as a NotFound response
                        tracing::debug!(url = %product_url, page = n, "Empty review page, ending walk");
                        WalkerState::Done
                    } else {
                        outcome.pages_visited += 1;
                        let kept = extracted.reviews.len();
                        outcome.reviews.extend(extracted.reviews);
                        last_page_seen = extracted.is_last_page;
                        tracing::debug!(url = %product_url, page = n, reviews = kept, "Page extracted");
                        WalkerState::Deciding(n)
                    }
                }

                WalkerState::Deciding(n) => match decide(n, self.page_cap, last_page_seen) {
                    Decision::NextPage(next) => WalkerState::FetchingPage(next),
                    Decision::Finished => WalkerState::Done,
                },

                WalkerState::Done => {
                    outcome.status = WalkStatus::Complete;
                    break;
                }

                WalkerState::Aborted => {
                    outcome.status = WalkStatus::Aborted;
                    break;
                }
            };
        }

        tracing::info!(
            url = %product_url,
            status = outcome.status.as_str(),
            pages = outcome.pages_visited,
            reviews = outcome.reviews.len(),
            "Walk finished"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_respects_cap() {
        assert_eq!(decide(1, Some(3), false), Decision::NextPage(2));
        assert_eq!(decide(2, Some(3), false), Decision::NextPage(3));
        assert_eq!(decide(3, Some(3), false), Decision::Finished);
    }

    #[test]
    fn test_decide_last_page_signal_wins() {
        assert_eq!(decide(1, Some(10), true), Decision::Finished);
        assert_eq!(decide(1, None, true), Decision::Finished);
    }

    #[test]
    fn test_decide_unbounded_hits_hard_ceiling() {
        assert_eq!(
            decide(HARD_PAGE_CEILING - 1, None, false),
            Decision::NextPage(HARD_PAGE_CEILING)
        );
        assert_eq!(decide(HARD_PAGE_CEILING, None, false), Decision::Finished);
    }

    #[test]
    fn test_review_page_urls() {
        assert_eq!(
            review_page_url("https://e.com/p/A1", 1),
            "https://e.com/p/A1"
        );
        assert_eq!(
            review_page_url("https://e.com/p/A1", 2),
            "https://e.com/p/A1?page=2"
        );
        assert_eq!(
            review_page_url("https://e.com/p/A1?tab=reviews", 3),
            "https://e.com/p/A1?tab=reviews&page=3"
        );
    }
}
