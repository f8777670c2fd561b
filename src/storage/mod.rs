//! SQLite persistence for scraped products, reviews and run metadata
//!
//! Single-writer storage: the connection sits behind a `Mutex` and all
//! rows for one product walk are written inside one transaction, so a
//! reader never observes a partially written product.

pub mod export;

pub use export::Exporter;

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Product, Review, ScrapeMetadata, WalkOutcome};

/// Database wrapper owning the SQLite connection
pub struct Database {
    conn: Mutex<Connection>,
}

/// Row counts across the three tables
#[derive(Debug, Clone, Copy)]
pub struct TableCounts {
    pub products: u64,
    pub reviews: u64,
    pub metadata: u64,
}

impl Database {
    /// Open (or create) the database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite database initialized");
        Ok(db)
    }

    /// In-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_schema()?;
        Ok(db)
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                item_number TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                brand TEXT NOT NULL,
                price TEXT NOT NULL,
                rating TEXT NOT NULL,
                reviews_count TEXT NOT NULL,
                description TEXT NOT NULL,
                product_url TEXT NOT NULL,
                scraped_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reviews (
                review_id TEXT PRIMARY KEY,
                product_item_number TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                review_index INTEGER NOT NULL,
                title TEXT NOT NULL,
                rating TEXT NOT NULL,
                author TEXT NOT NULL,
                date TEXT NOT NULL,
                is_verified INTEGER NOT NULL,
                ownership TEXT NOT NULL,
                pros TEXT NOT NULL,
                cons TEXT NOT NULL,
                overall_review TEXT NOT NULL,
                full_content TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reviews_product
                ON reviews(product_item_number);

            CREATE UNIQUE INDEX IF NOT EXISTS idx_reviews_position
                ON reviews(product_item_number, page_number, review_index);

            CREATE TABLE IF NOT EXISTS metadata (
                product_url TEXT PRIMARY KEY,
                scraped_at TEXT NOT NULL,
                total_review_pages INTEGER NOT NULL,
                total_reviews INTEGER NOT NULL,
                scraper_version TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to create schema")?;

        Ok(())
    }

    /// Persist one walk as an atomic unit: product row (when present),
    /// all review rows and the metadata row commit together or not at
    /// all. Re-running an unchanged walk replaces rows in place and
    /// produces no duplicates.
    pub fn store_walk(&self, outcome: &WalkOutcome) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().context("Failed to begin transaction")?;

        if let Some(product) = &outcome.product {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO products
                (item_number, title, brand, price, rating, reviews_count, description, product_url, scraped_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    product.item_number,
                    product.title,
                    product.brand,
                    product.price,
                    product.rating,
                    product.reviews_count,
                    product.description,
                    product.product_url,
                    product.scraped_at.to_rfc3339(),
                ],
            )
            .context("Failed to upsert product")?;
        }

        for review in &outcome.reviews {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO reviews
                (review_id, product_item_number, page_number, review_index, title, rating,
                 author, date, is_verified, ownership, pros, cons, overall_review,
                 full_content, timestamp)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                "#,
                params![
                    review.review_id,
                    review.product_item_number,
                    review.page_number,
                    review.review_index,
                    review.title,
                    review.rating,
                    review.author,
                    review.date,
                    review.is_verified,
                    review.ownership,
                    review.pros,
                    review.cons,
                    review.overall_review,
                    review.full_content,
                    review.timestamp.to_rfc3339(),
                ],
            )
            .context("Failed to upsert review")?;
        }

        let metadata = outcome.metadata();
        tx.execute(
            r#"
            INSERT OR REPLACE INTO metadata
            (product_url, scraped_at, total_review_pages, total_reviews, scraper_version)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                metadata.product_url,
                metadata.scraped_at.to_rfc3339(),
                metadata.total_review_pages,
                metadata.total_reviews,
                metadata.scraper_version,
            ],
        )
        .context("Failed to upsert metadata")?;

        tx.commit().context("Failed to commit walk")?;

        tracing::debug!(
            url = %outcome.product_url,
            reviews = outcome.reviews.len(),
            pages = outcome.pages_visited,
            "Walk persisted"
        );

        Ok(())
    }

    /// Load a product by its natural key
    pub fn get_product(&self, item_number: &str) -> Result<Option<Product>> {
        let conn = self.conn.lock().unwrap();
        let product = conn
            .query_row(
                "SELECT item_number, title, brand, price, rating, reviews_count,
                        description, product_url, scraped_at
                 FROM products WHERE item_number = ?1",
                params![item_number],
                |row| {
                    Ok(Product {
                        item_number: row.get(0)?,
                        title: row.get(1)?,
                        brand: row.get(2)?,
                        price: row.get(3)?,
                        rating: row.get(4)?,
                        reviews_count: row.get(5)?,
                        description: row.get(6)?,
                        product_url: row.get(7)?,
                        scraped_at: parse_timestamp(&row.get::<_, String>(8)?),
                    })
                },
            )
            .optional()
            .context("Failed to get product")?;

        Ok(product)
    }

    /// Load all reviews for a product, ordered by page then index
    pub fn get_reviews(&self, item_number: &str) -> Result<Vec<Review>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT review_id, product_item_number, page_number, review_index, title,
                        rating, author, date, is_verified, ownership, pros, cons,
                        overall_review, full_content, timestamp
                 FROM reviews WHERE product_item_number = ?1
                 ORDER BY page_number, review_index",
            )
            .context("Failed to prepare review query")?;

        let reviews = stmt
            .query_map(params![item_number], |row| {
                Ok(Review {
                    review_id: row.get(0)?,
                    product_item_number: row.get(1)?,
                    page_number: row.get(2)?,
                    review_index: row.get(3)?,
                    title: row.get(4)?,
                    rating: row.get(5)?,
                    author: row.get(6)?,
                    date: row.get(7)?,
                    is_verified: row.get(8)?,
                    ownership: row.get(9)?,
                    pros: row.get(10)?,
                    cons: row.get(11)?,
                    overall_review: row.get(12)?,
                    full_content: row.get(13)?,
                    timestamp: parse_timestamp(&row.get::<_, String>(14)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read reviews")?;

        Ok(reviews)
    }

    /// Load the metadata row for a product URL
    pub fn get_metadata(&self, product_url: &str) -> Result<Option<ScrapeMetadata>> {
        let conn = self.conn.lock().unwrap();
        let metadata = conn
            .query_row(
                "SELECT product_url, scraped_at, total_review_pages, total_reviews, scraper_version
                 FROM metadata WHERE product_url = ?1",
                params![product_url],
                |row| {
                    Ok(ScrapeMetadata {
                        product_url: row.get(0)?,
                        scraped_at: parse_timestamp(&row.get::<_, String>(1)?),
                        total_review_pages: row.get(2)?,
                        total_reviews: row.get(3)?,
                        scraper_version: row.get(4)?,
                    })
                },
            )
            .optional()
            .context("Failed to get metadata")?;

        Ok(metadata)
    }

    /// Row counts per table, for the stats command
    pub fn table_counts(&self) -> Result<TableCounts> {
        let conn = self.conn.lock().unwrap();
        let count = |table: &str| -> rusqlite::Result<u64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        };
        Ok(TableCounts {
            products: count("products")?,
            reviews: count("reviews")?,
            metadata: count("metadata")?,
        })
    }

    /// Count review rows for a product
    pub fn count_reviews(&self, item_number: &str) -> Result<u32> {
        let conn = self.conn.lock().unwrap();
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM reviews WHERE product_item_number = ?1",
            params![item_number],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// All products, for export
    pub fn all_products(&self) -> Result<Vec<Product>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT item_number, title, brand, price, rating, reviews_count,
                    description, product_url, scraped_at
             FROM products ORDER BY item_number",
        )?;

        let products = stmt
            .query_map([], |row| {
                Ok(Product {
                    item_number: row.get(0)?,
                    title: row.get(1)?,
                    brand: row.get(2)?,
                    price: row.get(3)?,
                    rating: row.get(4)?,
                    reviews_count: row.get(5)?,
                    description: row.get(6)?,
                    product_url: row.get(7)?,
                    scraped_at: parse_timestamp(&row.get::<_, String>(8)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read products")?;

        Ok(products)
    }

    /// All reviews, for export
    pub fn all_reviews(&self) -> Result<Vec<Review>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT review_id, product_item_number, page_number, review_index, title,
                    rating, author, date, is_verified, ownership, pros, cons,
                    overall_review, full_content, timestamp
             FROM reviews ORDER BY product_item_number, page_number, review_index",
        )?;

        let reviews = stmt
            .query_map([], |row| {
                Ok(Review {
                    review_id: row.get(0)?,
                    product_item_number: row.get(1)?,
                    page_number: row.get(2)?,
                    review_index: row.get(3)?,
                    title: row.get(4)?,
                    rating: row.get(5)?,
                    author: row.get(6)?,
                    date: row.get(7)?,
                    is_verified: row.get(8)?,
                    ownership: row.get(9)?,
                    pros: row.get(10)?,
                    cons: row.get(11)?,
                    overall_review: row.get(12)?,
                    full_content: row.get(13)?,
                    timestamp: parse_timestamp(&row.get::<_, String>(14)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read reviews")?;

        Ok(reviews)
    }

    /// All metadata rows, for export
    pub fn all_metadata(&self) -> Result<Vec<ScrapeMetadata>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT product_url, scraped_at, total_review_pages, total_reviews, scraper_version
             FROM metadata ORDER BY product_url",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ScrapeMetadata {
                    product_url: row.get(0)?,
                    scraped_at: parse_timestamp(&row.get::<_, String>(1)?),
                    total_review_pages: row.get(2)?,
                    total_reviews: row.get(3)?,
                    scraper_version: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read metadata")?;

        Ok(rows)
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WalkStatus;

    fn sample_review(item: &str, page: u32, index: u32) -> Review {
        Review {
            review_id: Review::synthetic_id(item, page, index),
            product_item_number: item.to_string(),
            page_number: page,
            review_index: index,
            title: format!("Review {page}-{index}"),
            rating: "4/5".to_string(),
            author: "Tester".to_string(),
            date: "1/2/2025".to_string(),
            is_verified: true,
            ownership: "1 week to 1 month".to_string(),
            pros: "Fast".to_string(),
            cons: "Loud".to_string(),
            overall_review: "Good".to_string(),
            full_content: "Pros: Fast\nCons: Loud\nOverall: Good".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn sample_walk(item: &str, pages: u32, per_page: u32) -> WalkOutcome {
        let mut reviews = Vec::new();
        for page in 1..=pages {
            for index in 1..=per_page {
                reviews.push(sample_review(item, page, index));
            }
        }

        WalkOutcome {
            product_url: format!("https://e.com/p/{item}"),
            status: WalkStatus::Complete,
            product: Some(Product {
                item_number: item.to_string(),
                title: "Test Product".to_string(),
                product_url: format!("https://e.com/p/{item}"),
                scraped_at: Utc::now(),
                ..Default::default()
            }),
            reviews,
            pages_visited: pages,
            extraction_skips: 0,
            abort_reason: None,
        }
    }

    #[test]
    fn test_store_and_read_back() {
        let db = Database::in_memory().unwrap();
        let walk = sample_walk("ITEM1", 2, 3);
        db.store_walk(&walk).unwrap();

        let product = db.get_product("ITEM1").unwrap().unwrap();
        assert_eq!(product.title, "Test Product");

        let reviews = db.get_reviews("ITEM1").unwrap();
        assert_eq!(reviews.len(), 6);
        assert_eq!(reviews[0].page_number, 1);
        assert_eq!(reviews[5].page_number, 2);

        let meta = db.get_metadata("https://e.com/p/ITEM1").unwrap().unwrap();
        assert_eq!(meta.total_review_pages, 2);
        assert_eq!(meta.total_reviews, 6);
    }

    #[test]
    fn test_rescrape_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let walk = sample_walk("ITEM1", 2, 3);

        db.store_walk(&walk).unwrap();
        db.store_walk(&walk).unwrap();

        assert_eq!(db.count_reviews("ITEM1").unwrap(), 6);
    }

    #[test]
    fn test_rescrape_replaces_product_fields() {
        let db = Database::in_memory().unwrap();
        let mut walk = sample_walk("ITEM1", 1, 1);
        db.store_walk(&walk).unwrap();

        walk.product.as_mut().unwrap().price = "399.00".to_string();
        db.store_walk(&walk).unwrap();

        let product = db.get_product("ITEM1").unwrap().unwrap();
        assert_eq!(product.price, "399.00");
    }

    #[test]
    fn test_partial_walk_persists_without_product() {
        let db = Database::in_memory().unwrap();
        let walk = WalkOutcome {
            product: None,
            status: WalkStatus::Aborted,
            abort_reason: Some("blocked".to_string()),
            ..sample_walk("ITEM2", 1, 2)
        };

        db.store_walk(&walk).unwrap();

        assert!(db.get_product("ITEM2").unwrap().is_none());
        assert_eq!(db.count_reviews("ITEM2").unwrap(), 2);
        let meta = db.get_metadata("https://e.com/p/ITEM2").unwrap().unwrap();
        assert_eq!(meta.total_review_pages, 1);
        assert_eq!(meta.total_reviews, 2);
    }

    #[test]
    fn test_metadata_overwritten_on_rescrape() {
        let db = Database::in_memory().unwrap();

        db.store_walk(&sample_walk("ITEM1", 3, 2)).unwrap();
        db.store_walk(&sample_walk("ITEM1", 1, 2)).unwrap();

        let meta = db.get_metadata("https://e.com/p/ITEM1").unwrap().unwrap();
        assert_eq!(meta.total_review_pages, 1);
        assert_eq!(meta.total_reviews, 2);
    }
}
