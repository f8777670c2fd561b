//! Configuration management for the magpie scraper
//!
//! Configuration is assembled once at startup from environment variables
//! or a TOML file, validated, and handed to the core as a single
//! immutable value.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scraper configuration
    pub scraper: ScraperConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Output configuration
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Identity rotation strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    /// Uniform draw, no repetition guarantee
    Random,
    /// Deterministic round-robin cycle
    Sequential,
    /// Draw biased toward least-used identities
    Weighted,
}

impl RotationStrategy {
    /// Parse from a config string; defaults are handled by the caller
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "random" => Some(Self::Random),
            "sequential" => Some(Self::Sequential),
            "weighted" => Some(Self::Weighted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Sequential => "sequential",
            Self::Weighted => "weighted",
        }
    }
}

/// Scraper-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Maximum review pages per product (0 = all pages)
    pub max_review_pages: u32,

    /// Rate limit across all workers (requests per second)
    pub rate_limit: f64,

    /// Minimum delay between any two requests, in milliseconds
    pub request_delay_ms: u64,

    /// Number of concurrent pagination workers
    pub worker_count: usize,

    /// Identity rotation strategy
    pub rotation_strategy: RotationStrategy,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum retry attempts for transient page-load failures
    pub max_retries: u32,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path (":memory:" for in-memory)
    pub path: PathBuf,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for CSV/JSON exports
    pub dir: PathBuf,

    /// Mirror the database tables to CSV files
    pub export_csv: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let max_review_pages = std::env::var("MAGPIE_MAX_REVIEW_PAGES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        let rate_limit = std::env::var("MAGPIE_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(1.0);

        let request_delay_ms = std::env::var("MAGPIE_REQUEST_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1000);

        let worker_count = std::env::var("MAGPIE_WORKER_COUNT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(3);

        let rotation_strategy = std::env::var("MAGPIE_ROTATION_STRATEGY")
            .ok()
            .and_then(|v| RotationStrategy::parse(&v))
            .unwrap_or(RotationStrategy::Random);

        let request_timeout_secs = std::env::var("MAGPIE_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        let max_retries = std::env::var("MAGPIE_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        let db_path = std::env::var("MAGPIE_DB_PATH")
            .unwrap_or_else(|_| String::from("data/reviews.db"))
            .into();

        let output_dir = std::env::var("MAGPIE_OUTPUT_DIR")
            .unwrap_or_else(|_| String::from("./data"))
            .into();

        let export_csv = std::env::var("MAGPIE_EXPORT_CSV")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        let log_level = std::env::var("MAGPIE_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let log_format =
            std::env::var("MAGPIE_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            scraper: ScraperConfig {
                max_review_pages,
                rate_limit,
                request_delay_ms,
                worker_count,
                rotation_strategy,
                request_timeout_secs,
                max_retries,
            },
            database: DatabaseConfig { path: db_path },
            output: OutputConfig {
                dir: output_dir,
                export_csv,
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scraper.worker_count == 0 {
            anyhow::bail!("worker_count must be greater than 0");
        }

        if self.scraper.rate_limit <= 0.0 {
            anyhow::bail!("rate_limit must be positive");
        }

        if self.scraper.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.scraper.request_timeout_secs)
    }

    /// Get minimum inter-request delay as Duration
    #[must_use]
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.scraper.request_delay_ms)
    }

    /// Effective page cap: `None` means "scrape until natural end"
    #[must_use]
    pub fn page_cap(&self) -> Option<u32> {
        if self.scraper.max_review_pages == 0 {
            None
        } else {
            Some(self.scraper.max_review_pages)
        }
    }

    /// Print the resolved configuration (for --show-config)
    pub fn print(&self) {
        println!("CONFIGURATION");
        println!("{}", "=".repeat(50));
        println!("Database path:    {}", self.database.path.display());
        println!(
            "Max review pages: {}",
            self.page_cap()
                .map(|c| c.to_string())
                .unwrap_or_else(|| String::from("all"))
        );
        println!("Rate limit:       {} req/s", self.scraper.rate_limit);
        println!("Request delay:    {} ms", self.scraper.request_delay_ms);
        println!("Worker count:     {}", self.scraper.worker_count);
        println!("Rotation:         {}", self.scraper.rotation_strategy.as_str());
        println!("Output directory: {}", self.output.dir.display());
        println!("Export CSV:       {}", self.output.export_csv);
        println!("Log level:        {}", self.logging.level);
        println!("{}", "=".repeat(50));
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig {
                max_review_pages: 3,
                rate_limit: 1.0,
                request_delay_ms: 1000,
                worker_count: 3,
                rotation_strategy: RotationStrategy::Random,
                request_timeout_secs: 60,
                max_retries: 3,
            },
            database: DatabaseConfig {
                path: PathBuf::from("data/reviews.db"),
            },
            output: OutputConfig {
                dir: PathBuf::from("./data"),
                export_csv: false,
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}
