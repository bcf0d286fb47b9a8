//! # Medikamio Scraper
//!
//! Crawls the multi-locale Medikamio disease catalog and stores one CSV row
//! per disease page.
//!
//! ## Features
//!
//! - Walks the paginated index of every configured locale
//! - Scrapes detail pages concurrently with a fixed upper bound
//! - Resumable: URLs already in the dataset are never fetched again
//! - Failed URLs are collected in a plain text error log
//!
//! ## Usage
//!
//! ```sh
//! medikamio_scraper -c 10 -o Medikamio.csv -e Error.txt
//! ```
//!
//! ## Architecture
//!
//! 1. **Resume**: load the URLs already present in the dataset
//! 2. **Walk**: per locale, read the page count and list detail links
//! 3. **Scrape**: fetch, extract and append each new detail page
//! 4. **Drain**: wait for every dispatched page before exiting

use clap::Parser;
use std::error::Error;
use tracing::{debug, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod dedup;
mod errors;
mod fetch;
mod models;
mod outputs;
mod pagination;
mod scheduler;
mod scrapers;
#[cfg(test)]
mod test_utils;
mod utils;

use cli::Cli;
use config::CrawlConfig;
use dedup::{DatasetState, DedupStore};
use fetch::HttpFetcher;
use outputs::dataset::DatasetWriter;
use outputs::error_log::ErrorSink;
use scheduler::{CrawlContext, Crawler};
use scrapers::medikamio::MedikamioExtractor;
use scrapers::Extractor;
use utils::ensure_parent_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("medikamio_scraper starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = match args.config {
        Some(ref path) => CrawlConfig::load(path)?,
        None => CrawlConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;
    let site = config.site_url()?;
    info!(
        concurrency = config.concurrency,
        locales = config.locales.len(),
        output = %config.output_path.display(),
        "Configuration ready"
    );

    ensure_parent_dir(&config.output_path)?;
    ensure_parent_dir(&config.error_log_path)?;

    // ---- Resume state ----
    let (store, state) = DedupStore::load(&config.output_path)?;
    match state {
        DatasetState::Missing => info!("Starting a new dataset"),
        DatasetState::Existing { rows } => {
            info!(rows, known_urls = store.len(), "Resuming existing dataset")
        }
    }

    let extractor = MedikamioExtractor;
    let writer = DatasetWriter::open(&config.output_path, extractor.columns())?;
    let fetcher = HttpFetcher::new(config.user_agent.as_deref())?;

    let ctx = CrawlContext {
        fetcher,
        extractor,
        writer,
        store,
        errors: ErrorSink::new(&config.error_log_path),
        debug_trace: config.debug_trace_on_error,
    };
    let crawler = Crawler::new(ctx, config.locales.clone(), site, config.concurrency);

    // ---- Crawl ----
    let summary = crawler.run().await?;

    info!(
        dispatched = summary.dispatched,
        written = summary.written,
        failed = summary.failed,
        skipped = summary.skipped,
        failed_locales = summary.failed_locales,
        peak_active = summary.peak_active,
        dataset = %crawler.context().writer.path().display(),
        error_log = %crawler.context().errors.path().display(),
        secs = summary.elapsed.as_secs(),
        millis = summary.elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
