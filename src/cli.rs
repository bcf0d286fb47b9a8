//! Command-line interface definitions.
//!
//! Flags override whatever the optional YAML config file provides, which in
//! turn overrides the built-in defaults.

use crate::config::CrawlConfig;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Medikamio scraper.
///
/// # Examples
///
/// ```sh
/// # Crawl every locale with the defaults
/// medikamio_scraper
///
/// # Only English and German, 4 pages at a time
/// medikamio_scraper -l EN -l DE -c 4 -o data/medikamio.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(long, env = "MEDIKAMIO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum number of detail pages processed concurrently
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Output CSV dataset
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// File receiving the URLs that failed
    #[arg(short, long)]
    pub error_log: Option<PathBuf>,

    /// Log per-URL failures as one line instead of the full error chain
    #[arg(long)]
    pub no_debug_trace: bool,

    /// Restrict the crawl to these locale tags (repeatable)
    #[arg(short, long = "locale")]
    pub locales: Vec<String>,
}

impl Cli {
    /// Apply the command-line overrides to a loaded configuration.
    pub fn apply(&self, config: &mut CrawlConfig) {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(ref output) = self.output {
            config.output_path = output.clone();
        }
        if let Some(ref error_log) = self.error_log {
            config.error_log_path = error_log.clone();
        }
        if self.no_debug_trace {
            config.debug_trace_on_error = false;
        }
        config.retain_locales(&self.locales);
    }
}
