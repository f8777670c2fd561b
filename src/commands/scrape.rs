use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use magpie::config::Config;
use magpie::crawler::{
    HttpNavigator, IdentityRotator, PageFetcher, RequestGate, RetryPolicy, WorkerPool,
};
use magpie::parser::ReviewExtractor;
use magpie::storage::{Database, Exporter};

pub async fn scrape(config: Config, urls: Vec<String>) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    if urls.is_empty() {
        anyhow::bail!("No product URLs given");
    }

    println!("Starting Product Review Scrape");
    println!("==============================");
    println!("URLs: {}", urls.len());
    println!(
        "Workers: {}, rate limit: {} req/s, page cap: {}",
        config.scraper.worker_count,
        config.scraper.rate_limit,
        match config.page_cap() {
            Some(cap) => cap.to_string(),
            None => "unbounded".to_string(),
        }
    );

    let db = Arc::new(Database::open(&config.database.path)?);

    let rotator = Arc::new(IdentityRotator::new(config.scraper.rotation_strategy)?);
    let gate = RequestGate::new(config.scraper.rate_limit, config.request_delay());
    let navigator = Arc::new(
        HttpNavigator::new(config.request_timeout()).context("Failed to build navigator")?,
    );
    let policy = RetryPolicy {
        max_attempts: config.scraper.max_retries.max(1),
        ..RetryPolicy::default()
    };
    let fetcher = Arc::new(PageFetcher::new(navigator, gate, rotator, policy));
    let extractor = Arc::new(ReviewExtractor::new()?);

    let pool = WorkerPool::new(
        Arc::clone(&fetcher),
        extractor,
        Arc::clone(&db),
        config.scraper.worker_count,
        config.page_cap(),
    );

    // Ctrl-C flips the stop signal; in-flight pages finish and their
    // partial results are still persisted.
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight pages");
            let _ = stop_tx.send(true);
        }
    });

    let report = pool.run(urls, stop_rx).await;

    println!("\nPer-URL Results");
    println!("---------------");
    for url_report in &report.reports {
        let detail = match &url_report.abort_reason {
            Some(reason) => format!(" ({reason})"),
            None => String::new(),
        };
        println!(
            "  [{}{}] {} - {} pages, {} reviews{}",
            url_report.status.as_str(),
            if url_report.stored { "" } else { ", not stored" },
            url_report.product_url,
            url_report.pages_visited,
            url_report.reviews_collected,
            detail
        );
    }

    let stats = &report.stats;
    println!("\nScrape Summary");
    println!("==============");
    println!("Products attempted: {}", stats.products_attempted);
    println!("  Complete: {}", stats.products_complete);
    println!("  Partial:  {}", stats.products_partial);
    println!("  Failed:   {}", stats.products_failed);
    println!("Pages visited: {}", stats.pages_visited);
    println!("Reviews written: {}", stats.reviews_written);
    println!("Fetch retries: {}", fetcher.retry_count());
    if stats.extraction_skips > 0 {
        println!("Malformed reviews skipped: {}", stats.extraction_skips);
    }
    println!("Completion rate: {:.1}%", stats.completion_rate() * 100.0);
    println!("Database: {}", config.database.path.display());

    if config.output.export_csv {
        let exporter = Exporter::new(&config.output.dir);
        exporter.write_csv(&db)?;
        let snapshot = exporter.write_json(&db)?;
        println!("Exports written to: {}", config.output.dir.display());
        println!("Snapshot: {}", snapshot.display());
    }

    Ok(())
}

pub fn stats(database: PathBuf) -> Result<()> {
    if !database.exists() {
        println!("Database not found: {}", database.display());
        println!("Run a scrape first to create the database.");
        return Ok(());
    }

    let db = Database::open(&database)?;
    let counts = db.table_counts()?;

    println!("Scrape Statistics");
    println!("=================");
    println!("Database: {}", database.display());
    println!();
    println!("Products: {}", counts.products);
    println!("Reviews:  {}", counts.reviews);
    println!("Runs:     {}", counts.metadata);

    for meta in db.all_metadata()? {
        println!(
            "  {} - {} pages, {} reviews ({})",
            meta.product_url,
            meta.total_review_pages,
            meta.total_reviews,
            meta.scraped_at.format("%Y-%m-%d %H:%M"),
        );
    }

    Ok(())
}

pub fn export(database: PathBuf, output: PathBuf) -> Result<()> {
    if !database.exists() {
        anyhow::bail!("Database not found: {}", database.display());
    }

    let db = Database::open(&database)?;
    let exporter = Exporter::new(&output);
    exporter.write_csv(&db)?;
    let snapshot = exporter.write_json(&db)?;

    println!("CSV tables written to: {}", output.display());
    println!("JSON snapshot: {}", snapshot.display());

    Ok(())
}
