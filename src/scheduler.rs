//! Crawl scheduler.
//!
//! A run walks every locale in configured order. Each detail URL found on an
//! index page is checked against the [`DedupStore`] and, if new, dispatched
//! as a unit of work: fetch → extract → append → mark seen.
//!
//! # Concurrency
//!
//! Units run as tasks on a [`JoinSet`] holding at most `concurrency` of them.
//! Before each spawn the walk settles whatever has finished and, while the
//! set is full, waits on the next unit to complete. The dataset lock is only
//! taken around the append itself.
//!
//! # Failures
//!
//! | Failure | Effect |
//! |---------|--------|
//! | fetch or extraction of a detail page | URL goes to the error log |
//! | panic inside a unit | URL goes to the error log |
//! | pagination or index page fetch | that locale stops, others continue |
//! | dataset append | admission stops, in-flight units drain, run fails |

use crate::dedup::DedupStore;
use crate::errors::CrawlError;
use crate::fetch::Fetch;
use crate::models::Locale;
use crate::outputs::dataset::DatasetWriter;
use crate::outputs::error_log::ErrorSink;
use crate::pagination::PaginationWalker;
use crate::scrapers::Extractor;
use crate::utils::truncate_for_log;
use futures::FutureExt;
use scraper::Html;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Everything a unit of work needs, shared by all units of a run.
pub struct CrawlContext<F, E> {
    pub fetcher: F,
    pub extractor: E,
    pub writer: DatasetWriter,
    pub store: DedupStore,
    pub errors: ErrorSink,
    /// Log per-URL failures with their full error chain.
    pub debug_trace: bool,
}

/// How a single unit of work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    Written,
    Failed,
}

/// Counters for a finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub dispatched: usize,
    pub written: usize,
    pub failed: usize,
    /// Candidates skipped because they were persisted or already dispatched.
    pub skipped: usize,
    pub failed_locales: usize,
    /// Most units observed running at the same time.
    pub peak_active: usize,
    pub elapsed: Duration,
}

/// Live count of running units and the highest it reached.
#[derive(Debug, Default)]
struct ActiveUnits {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ActiveUnits {
    fn enter(self: &Arc<Self>) -> ActiveUnit {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ActiveUnit(Arc::clone(self))
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Counts as running until dropped.
struct ActiveUnit(Arc<ActiveUnits>);

impl Drop for ActiveUnit {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Crawler<F, E> {
    ctx: Arc<CrawlContext<F, E>>,
    locales: Vec<Locale>,
    site: Url,
    concurrency: usize,
}

type UnitResult = (String, Result<UnitOutcome, CrawlError>);

impl<F: Fetch, E: Extractor> Crawler<F, E> {
    pub fn new(ctx: CrawlContext<F, E>, locales: Vec<Locale>, site: Url, concurrency: usize) -> Self {
        Self {
            ctx: Arc::new(ctx),
            locales,
            site,
            concurrency: concurrency.max(1),
        }
    }

    pub fn context(&self) -> &CrawlContext<F, E> {
        &self.ctx
    }

    /// Walk every locale, dispatch new detail pages and wait for all of them.
    #[instrument(level = "info", skip_all, fields(concurrency = self.concurrency))]
    pub async fn run(&self) -> Result<CrawlSummary, CrawlError> {
        let started = std::time::Instant::now();
        let active = Arc::new(ActiveUnits::default());
        let mut units: JoinSet<UnitResult> = JoinSet::new();
        let mut summary = CrawlSummary::default();
        let mut fatal: Option<CrawlError> = None;

        let walker = PaginationWalker::new(
            &self.ctx.fetcher,
            self.ctx.extractor.index_layout(),
            &self.site,
        );

        'locales: for locale in &self.locales {
            let index = match walker.discover_page_count(locale).await {
                Ok(index) => index,
                Err(e) => {
                    error!(locale = %locale.tag, error = %e, "Skipping locale");
                    summary.failed_locales += 1;
                    continue;
                }
            };
            info!(locale = %locale.tag, page_count = index.page_count, "Walking locale");

            for page in index.pages() {
                let urls = match walker.urls_on_page(&index, page).await {
                    Ok(urls) => urls,
                    Err(e) => {
                        error!(locale = %locale.tag, page, error = %e, "Abandoning locale");
                        summary.failed_locales += 1;
                        continue 'locales;
                    }
                };

                for url in urls {
                    if self.ctx.store.contains(&url) {
                        info!(%url, "Already scraped");
                        summary.skipped += 1;
                        continue;
                    }
                    if !self.ctx.store.claim(&url) {
                        debug!(%url, "Already dispatched in this run");
                        summary.skipped += 1;
                        continue;
                    }

                    while let Some(done) = units.try_join_next() {
                        settle(done, &mut summary, &mut fatal);
                    }
                    while units.len() >= self.concurrency {
                        let Some(done) = units.join_next().await else {
                            break;
                        };
                        settle(done, &mut summary, &mut fatal);
                    }
                    if fatal.is_some() {
                        break 'locales;
                    }

                    let ctx = Arc::clone(&self.ctx);
                    let gauge = Arc::clone(&active);
                    let unit_locale = locale.clone();
                    units.spawn(async move {
                        let _running = gauge.enter();
                        let outcome = run_unit(&ctx, &unit_locale, &url).await;
                        (url, outcome)
                    });
                    summary.dispatched += 1;
                }
            }
        }

        info!(in_flight = units.len(), "Draining units of work");
        while let Some(done) = units.join_next().await {
            settle(done, &mut summary, &mut fatal);
        }

        summary.peak_active = active.peak();
        summary.elapsed = started.elapsed();
        match fatal {
            Some(e) => {
                error!(error = %e, written = summary.written, "Crawl aborted");
                Err(e)
            }
            None => Ok(summary),
        }
    }
}

/// Fold one finished unit into the summary.
fn settle(
    done: Result<UnitResult, JoinError>,
    summary: &mut CrawlSummary,
    fatal: &mut Option<CrawlError>,
) {
    match done {
        Ok((_, Ok(UnitOutcome::Written))) => summary.written += 1,
        Ok((_, Ok(UnitOutcome::Failed))) => summary.failed += 1,
        Ok((url, Err(e))) => {
            error!(%url, error = %e, "Persisting record failed");
            summary.failed += 1;
            fatal.get_or_insert(e);
        }
        // Units catch their own panics, so this is a cancelled task.
        Err(e) => {
            error!(error = %e, "Unit of work did not complete");
            summary.failed += 1;
        }
    }
}

/// Process one detail URL, routing per-URL failures to the error log.
///
/// Only dataset persistence failures are returned as errors.
#[instrument(level = "info", skip(ctx, locale), fields(locale = %locale.tag))]
async fn run_unit<F: Fetch, E: Extractor>(
    ctx: &CrawlContext<F, E>,
    locale: &Locale,
    url: &str,
) -> Result<UnitOutcome, CrawlError> {
    info!("Working on detail page");
    let result = AssertUnwindSafe(scrape(ctx, locale, url)).catch_unwind().await;
    match result {
        Ok(Ok(())) => Ok(UnitOutcome::Written),
        Ok(Err(e)) if e.is_url_scoped() => {
            if ctx.debug_trace {
                error!(error = ?e, "Scraping failed");
            } else {
                warn!(error = %e, "Scraping failed");
            }
            ctx.errors.record(url);
            Ok(UnitOutcome::Failed)
        }
        Ok(Err(e)) => Err(e),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            error!(%message, "Unit of work panicked");
            ctx.errors.record(url);
            Ok(UnitOutcome::Failed)
        }
    }
}

async fn scrape<F: Fetch, E: Extractor>(
    ctx: &CrawlContext<F, E>,
    locale: &Locale,
    url: &str,
) -> Result<(), CrawlError> {
    let body = ctx.fetcher.get(url).await?;
    let record = {
        let document = Html::parse_document(&body);
        ctx.extractor.extract(locale, url, &document)?
    };
    if let Ok(json) = serde_json::to_string_pretty(&record) {
        debug!(fields = record.len(), record = %truncate_for_log(&json, 2000), "Extracted record");
    }
    ctx.writer.append(&record)?;
    ctx.store.mark_seen(url);
    Ok(())
}
