//! Scrape orchestration: identities, rate limiting, fetching, walking
//!
//! This module implements the core scraping pipeline: browser identities
//! rotate per request, every fetch passes the shared rate gate, and a
//! worker pool runs one pagination walker per product URL.

pub mod fetcher;
pub mod identity;
pub mod limiter;
pub mod navigator;
pub mod pool;
pub mod walker;

pub use fetcher::{PageFetcher, RetryPolicy};
pub use identity::{Identity, IdentityRotator};
pub use limiter::RequestGate;
pub use navigator::{HttpNavigator, PageNavigator, RenderedPage};
pub use pool::{PoolReport, UrlReport, WorkerPool};
pub use walker::{PageWalker, WalkerState, HARD_PAGE_CEILING};
