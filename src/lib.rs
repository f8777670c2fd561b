//! magpie - Product review scraper
//!
//! A scrape orchestration core for paginated product review pages, with
//! identity rotation, global rate limiting and idempotent SQLite storage.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Identity rotation, rate gating, fetching and walking
//! - [`parser`] - HTML extraction of product fields and reviews
//! - [`models`] - Core data structures and types
//! - [`storage`] - SQLite persistence and CSV/JSON export
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use magpie::config::Config;
//! use magpie::crawler::{HttpNavigator, IdentityRotator, PageFetcher, RequestGate, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let rotator = Arc::new(IdentityRotator::new(config.scraper.rotation_strategy)?);
//!     let gate = RequestGate::new(config.scraper.rate_limit, config.request_delay());
//!     let navigator = Arc::new(HttpNavigator::new(config.request_timeout())?);
//!     let _fetcher = PageFetcher::new(navigator, gate, rotator, RetryPolicy::default());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod parser;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, RotationStrategy};
    pub use crate::crawler::{
        IdentityRotator, PageFetcher, PageWalker, RequestGate, WorkerPool,
    };
    pub use crate::error::{Error, ErrorCategory, FetchError, Result};
    pub use crate::models::{Product, Review, RunStats, WalkOutcome, WalkStatus};
    pub use crate::parser::ReviewExtractor;
    pub use crate::storage::Database;
}
