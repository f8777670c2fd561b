use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use magpie::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "magpie",
    version,
    about = "Product review scraper with identity rotation and rate limiting",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables used otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape product pages and their reviews
    Scrape {
        /// Product page URLs to scrape
        urls: Vec<String>,

        /// Maximum review pages per product (0 = all pages)
        #[arg(short, long)]
        max_pages: Option<u32>,

        /// Number of concurrent workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Database file path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output directory for exports
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write CSV tables and a JSON snapshot after scraping
        #[arg(long, default_value = "false")]
        export: bool,

        /// Skip the export step even when the configuration enables it
        #[arg(long, default_value = "false", conflicts_with = "export")]
        no_export: bool,

        /// Print the resolved configuration and exit
        #[arg(long, default_value = "false")]
        show_config: bool,
    },

    /// Show statistics from a scrape database
    Stats {
        /// Database file path
        #[arg(short, long, default_value = "data/reviews.db")]
        database: PathBuf,
    },

    /// Export a scrape database to CSV and JSON
    Export {
        /// Database file path
        #[arg(short, long, default_value = "data/reviews.db")]
        database: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "./data")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    match cli.command {
        Commands::Scrape {
            urls,
            max_pages,
            workers,
            db,
            output,
            export,
            no_export,
            show_config,
        } => {
            let mut config = config;
            if let Some(max_pages) = max_pages {
                config.scraper.max_review_pages = max_pages;
            }
            if let Some(workers) = workers {
                config.scraper.worker_count = workers;
            }
            if let Some(db) = db {
                config.database.path = db;
            }
            if let Some(output) = output {
                config.output.dir = output;
            }
            apply_export_flags(&mut config, export, no_export);

            if show_config {
                config.print();
                return Ok(());
            }

            tracing::info!(urls = urls.len(), "Starting scrape command");
            commands::scrape(config, urls).await?;
        }

        Commands::Stats { database } => {
            commands::stats(database)?;
        }

        Commands::Export { database, output } => {
            commands::export(database, output)?;
        }
    }

    Ok(())
}

fn apply_export_flags(config: &mut Config, export: bool, no_export: bool) {
    if export {
        config.output.export_csv = true;
    }
    if no_export {
        config.output.export_csv = false;
    }
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("magpie=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("magpie=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
