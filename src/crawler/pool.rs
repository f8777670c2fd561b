//! Concurrent walk scheduling across a pool of workers
//!
//! A fixed number of workers pull product URLs from a shared queue and
//! run one pagination walk each to completion. Finished walks are
//! funneled into a single writer task so database writes stay
//! serialized. One URL failing never takes down the pool; its outcome
//! is recorded and the remaining URLs proceed.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};

use crate::crawler::fetcher::PageFetcher;
use crate::crawler::walker::PageWalker;
use crate::models::{RunStats, WalkOutcome, WalkStatus};
use crate::parser::ReviewExtractor;
use crate::storage::Database;

/// Per-URL result surfaced to the caller after the pool drains
#[derive(Debug, Clone)]
pub struct UrlReport {
    pub product_url: String,
    pub status: WalkStatus,
    pub pages_visited: u32,
    pub reviews_collected: usize,
    /// Whether the walk made it into the database
    pub stored: bool,
    pub abort_reason: Option<String>,
}

/// Everything a finished pool run reports back
#[derive(Debug)]
pub struct PoolReport {
    pub reports: Vec<UrlReport>,
    pub stats: RunStats,
}

/// Fixed-size pool of pagination walkers over a shared URL queue
pub struct WorkerPool {
    fetcher: Arc<PageFetcher>,
    extractor: Arc<ReviewExtractor>,
    db: Arc<Database>,
    worker_count: usize,
    page_cap: Option<u32>,
}

impl WorkerPool {
    pub fn new(
        fetcher: Arc<PageFetcher>,
        extractor: Arc<ReviewExtractor>,
        db: Arc<Database>,
        worker_count: usize,
        page_cap: Option<u32>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            db,
            worker_count: worker_count.max(1),
            page_cap,
        }
    }

    /// Walk every URL and drain all results.
    ///
    /// When `stop` flips to true, workers finish the page they are on and
    /// stop picking up new fetches; everything collected so far is still
    /// persisted. The call returns once all workers and the writer have
    /// drained.
    pub async fn run(&self, urls: Vec<String>, stop: watch::Receiver<bool>) -> PoolReport {
        let total = urls.len();
        let workers = self.worker_count.min(total.max(1));

        tracing::info!(urls = total, workers, "Worker pool starting");

        let (url_tx, url_rx) = mpsc::channel::<String>(total.max(1));
        let url_rx = Arc::new(Mutex::new(url_rx));

        // Single consumer keeps database writes serialized.
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<WalkOutcome>(workers.max(1));
        let db = Arc::clone(&self.db);
        let writer = tokio::spawn(async move {
            let mut reports = Vec::new();
            let mut stats = RunStats::default();

            while let Some(outcome) = outcome_rx.recv().await {
                let stored = match db.store_walk(&outcome) {
                    Ok(()) => true,
                    Err(error) => {
                        tracing::error!(
                            url = %outcome.product_url,
                            %error,
                            "Failed to persist walk, outcome dropped"
                        );
                        false
                    }
                };

                stats.record(&outcome, stored);
                reports.push(UrlReport {
                    product_url: outcome.product_url.clone(),
                    status: outcome.status,
                    pages_visited: outcome.pages_visited,
                    reviews_collected: outcome.reviews.len(),
                    stored,
                    abort_reason: outcome.abort_reason.clone(),
                });
            }

            PoolReport { reports, stats }
        });

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let url_rx = Arc::clone(&url_rx);
            let outcome_tx = outcome_tx.clone();
            let walker = PageWalker::new(
                Arc::clone(&self.fetcher),
                Arc::clone(&self.extractor),
                self.page_cap,
                stop.clone(),
            );
            let stop = stop.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    if *stop.borrow() {
                        tracing::debug!(worker_id, "Stop requested, worker exiting");
                        break;
                    }

                    let url = {
                        let mut rx = url_rx.lock().await;
                        rx.recv().await
                    };

                    let Some(url) = url else { break };

                    tracing::debug!(worker_id, url = %url, "Worker picked up URL");
                    let outcome = walker.run(&url).await;

                    if outcome_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(outcome_tx);

        for url in urls {
            if url_tx.send(url).await.is_err() {
                break;
            }
        }
        drop(url_tx);

        for result in futures::future::join_all(handles).await {
            if let Err(error) = result {
                tracing::error!(%error, "Worker task panicked");
            }
        }

        match writer.await {
            Ok(report) => {
                tracing::info!(
                    complete = report.stats.products_complete,
                    partial = report.stats.products_partial,
                    failed = report.stats.products_failed,
                    "Worker pool finished"
                );
                report
            }
            Err(error) => {
                tracing::error!(%error, "Writer task panicked");
                PoolReport {
                    reports: Vec::new(),
                    stats: RunStats::default(),
                }
            }
        }
    }
}
