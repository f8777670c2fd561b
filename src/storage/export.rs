//! CSV and JSON export of the stored tables
//!
//! CSV mirrors each table one-to-one for spreadsheet use; the JSON
//! snapshot combines all three tables into a single timestamped file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use super::Database;
use crate::models::{Product, Review, ScrapeMetadata};

/// Combined snapshot written by [`Exporter::write_json`]
#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    exported_at: chrono::DateTime<Utc>,
    scraper_version: &'static str,
    products: &'a [Product],
    reviews: &'a [Review],
    metadata: &'a [ScrapeMetadata],
}

/// Writes the database contents out as CSV files and a JSON snapshot
pub struct Exporter {
    output_dir: PathBuf,
}

impl Exporter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Write products.csv, reviews.csv and metadata.csv
    pub fn write_csv(&self, db: &Database) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)
            .context("Failed to create output directory")?;

        self.write_table(db.all_products()?, "products.csv")?;
        self.write_table(db.all_reviews()?, "reviews.csv")?;
        self.write_table(db.all_metadata()?, "metadata.csv")?;

        tracing::info!(dir = %self.output_dir.display(), "CSV export complete");
        Ok(())
    }

    fn write_table<T: Serialize>(&self, rows: Vec<T>, filename: &str) -> Result<()> {
        let path = self.output_dir.join(filename);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        tracing::debug!(file = %path.display(), rows = rows.len(), "Table exported");
        Ok(())
    }

    /// Write a combined JSON snapshot, named by export time
    pub fn write_json(&self, db: &Database) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)
            .context("Failed to create output directory")?;

        let products = db.all_products()?;
        let reviews = db.all_reviews()?;
        let metadata = db.all_metadata()?;

        let snapshot = Snapshot {
            exported_at: Utc::now(),
            scraper_version: env!("CARGO_PKG_VERSION"),
            products: &products,
            reviews: &reviews,
            metadata: &metadata,
        };

        let filename = format!("snapshot_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = self.output_dir.join(filename);
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!(file = %path.display(), "JSON snapshot written");
        Ok(path)
    }
}
