// Core data structures for the magpie scraper

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker stored for review fields that could not be extracted.
///
/// Partial review data is still emitted; a missing rating or author is
/// recorded as this marker instead of dropping the record.
pub const UNKNOWN: &str = "N/A";

/// Marker for pros/cons/overall sections absent from a review body.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Product attributes extracted from the product-detail page
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Product {
    /// Natural key, e.g. "N82E16819113877"
    pub item_number: String,
    pub title: String,
    pub brand: String,
    pub price: String,
    pub rating: String,
    pub reviews_count: String,
    pub description: String,
    pub product_url: String,
    pub scraped_at: DateTime<Utc>,
}

/// A single review record, one per review element on a review page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Natural key: native site ID when available, else synthesized
    /// from product, page and index (see [`Review::synthetic_id`])
    pub review_id: String,
    pub product_item_number: String,
    pub page_number: u32,
    /// One-based ordinal position on the page
    pub review_index: u32,
    pub title: String,
    pub rating: String,
    pub author: String,
    pub date: String,
    pub is_verified: bool,
    pub ownership: String,
    pub pros: String,
    pub cons: String,
    pub overall_review: String,
    pub full_content: String,
    pub timestamp: DateTime<Utc>,
}

impl Review {
    /// Synthesize the review key from product, page and index.
    ///
    /// Used when the site exposes no native review ID. The key is stable
    /// for unchanged pages but may shift if the site reorders reviews
    /// between runs; that is an accepted limitation of the synthetic key.
    pub fn synthetic_id(item_number: &str, page_number: u32, review_index: u32) -> String {
        format!("{item_number}:p{page_number}:r{review_index}")
    }
}

/// Outcome record for one product URL, overwritten on re-scrape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeMetadata {
    /// Natural key
    pub product_url: String,
    pub scraped_at: DateTime<Utc>,
    /// Pages the walker actually visited, not the site-reported total
    pub total_review_pages: u32,
    /// Count of review rows written in this run
    pub total_reviews: u32,
    pub scraper_version: String,
}

impl ScrapeMetadata {
    /// Build metadata for a completed (or aborted) walk
    pub fn for_walk(product_url: &str, pages: u32, reviews: u32) -> Self {
        Self {
            product_url: product_url.to_string(),
            scraped_at: Utc::now(),
            total_review_pages: pages,
            total_reviews: reviews,
            scraper_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// How a pagination walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkStatus {
    /// Walker reached the configured cap or the natural end of pagination
    Complete,
    /// Walker aborted (blocked or fatal error); collected pages are kept
    Aborted,
}

impl WalkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalkStatus::Complete => "complete",
            WalkStatus::Aborted => "aborted",
        }
    }
}

/// Everything one pagination walk collected for a single product.
///
/// Yielded by the walker in both terminal states so partial data from
/// an aborted walk can still be persisted.
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub product_url: String,
    pub status: WalkStatus,
    /// Populated from page 1 only; `None` if page 1 was never reached
    pub product: Option<Product>,
    pub reviews: Vec<Review>,
    /// Pages that yielded extracted content
    pub pages_visited: u32,
    /// Review elements skipped as malformed across all pages
    pub extraction_skips: u32,
    /// Error description for aborted walks
    pub abort_reason: Option<String>,
}

impl WalkOutcome {
    /// Metadata row matching this walk's actual counts
    pub fn metadata(&self) -> ScrapeMetadata {
        ScrapeMetadata::for_walk(
            &self.product_url,
            self.pages_visited,
            self.reviews.len() as u32,
        )
    }
}

/// Per-run counters across all products
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub products_attempted: u32,
    pub products_complete: u32,
    pub products_partial: u32,
    pub products_failed: u32,
    pub pages_visited: u32,
    pub reviews_written: u32,
    pub extraction_skips: u32,
}

impl RunStats {
    /// Record one walk outcome into the counters
    pub fn record(&mut self, outcome: &WalkOutcome, stored: bool) {
        self.products_attempted += 1;
        self.pages_visited += outcome.pages_visited;
        if stored {
            self.reviews_written += outcome.reviews.len() as u32;
        }
        match outcome.status {
            WalkStatus::Complete => self.products_complete += 1,
            WalkStatus::Aborted if outcome.pages_visited > 0 => self.products_partial += 1,
            WalkStatus::Aborted => self.products_failed += 1,
        }
    }

    /// Completion rate across attempted products (0.0 - 1.0)
    pub fn completion_rate(&self) -> f64 {
        if self.products_attempted == 0 {
            return 1.0;
        }
        self.products_complete as f64 / self.products_attempted as f64
    }
}
