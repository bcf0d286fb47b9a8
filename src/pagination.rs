//! Pagination traversal of a locale's index pages.
//!
//! The first index page is fetched once. Its pagination control tells how
//! many pages the locale has, and its hit list is reused as page 1. Later
//! pages are fetched as `{index_url}?page={n}`.
//!
//! Pages are walked over `1..page_count`, so the last reported page is never
//! visited. A catalog reporting pages `[1, 2, 3, 4, 5]` yields pages 1 to 4.

use crate::errors::{CrawlError, FetchError, PaginationError};
use crate::fetch::{fetch_document, Fetch};
use crate::models::Locale;
use crate::scrapers::IndexLayout;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::ops::Range;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// What the first index page of a locale revealed.
#[derive(Debug, Clone)]
pub struct LocaleIndex {
    pub locale: Locale,
    /// Page number read from the last pagination item.
    pub page_count: u32,
    first_page_links: Vec<String>,
}

impl LocaleIndex {
    /// Page numbers the walk visits, in increasing order.
    pub fn pages(&self) -> Range<u32> {
        1..self.page_count
    }
}

/// Walks the index pages of one catalog.
pub struct PaginationWalker<'a, F> {
    fetcher: &'a F,
    layout: &'a IndexLayout,
    site: &'a Url,
}

impl<'a, F: Fetch> PaginationWalker<'a, F> {
    pub fn new(fetcher: &'a F, layout: &'a IndexLayout, site: &'a Url) -> Self {
        Self {
            fetcher,
            layout,
            site,
        }
    }

    /// Fetch the locale's index page and read its page count.
    #[instrument(level = "info", skip_all, fields(locale = %locale.tag))]
    pub async fn discover_page_count(&self, locale: &Locale) -> Result<LocaleIndex, CrawlError> {
        let document = fetch_document(self.fetcher, &locale.index_url).await?;
        let page_count = page_count(&document, self.layout, locale)?;
        let first_page_links = self.detail_links(&document);
        info!(page_count, "Discovered page count");
        Ok(LocaleIndex {
            locale: locale.clone(),
            page_count,
            first_page_links,
        })
    }

    /// Absolute detail page URLs listed on `page`.
    #[instrument(level = "info", skip_all, fields(locale = %index.locale.tag, page = page))]
    pub async fn urls_on_page(
        &self,
        index: &LocaleIndex,
        page: u32,
    ) -> Result<Vec<String>, CrawlError> {
        info!("Working on page");
        if page <= 1 {
            return Ok(index.first_page_links.clone());
        }
        let page_url = self.page_url(&index.locale, page)?;
        let document = fetch_document(self.fetcher, &page_url).await?;
        Ok(self.detail_links(&document))
    }

    fn page_url(&self, locale: &Locale, page: u32) -> Result<String, CrawlError> {
        let mut url = Url::parse(&locale.index_url).map_err(|source| FetchError::InvalidUrl {
            url: locale.index_url.clone(),
            source,
        })?;
        url.query_pairs_mut()
            .append_pair(self.layout.page_param, &page.to_string());
        Ok(url.to_string())
    }

    fn detail_links(&self, document: &Html) -> Vec<String> {
        let mut links = Vec::new();
        for anchor in document.select(&self.layout.hit_link) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            match self.site.join(href) {
                Ok(resolved) => links.push(resolved.to_string()),
                Err(e) => warn!(%href, error = %e, "Skipping unresolvable detail link"),
            }
        }
        debug!(count = links.len(), "Collected detail links");
        links
    }
}

static ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a").expect("static selector must parse"));

/// Read the page number from the href of the last pagination item.
pub fn page_count(
    document: &Html,
    layout: &IndexLayout,
    locale: &Locale,
) -> Result<u32, PaginationError> {
    let no_pagination = || PaginationError::NoPagination {
        locale: locale.tag.clone(),
        url: locale.index_url.clone(),
    };

    let last_item = document
        .select(&layout.pagination_item)
        .last()
        .ok_or_else(no_pagination)?;
    let href = last_item
        .select(&ANCHOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .ok_or_else(no_pagination)?;

    let unreadable = || PaginationError::UnreadablePageNumber {
        locale: locale.tag.clone(),
        href: href.to_string(),
    };
    let base = Url::parse(&locale.index_url).map_err(|_| unreadable())?;
    let target = base.join(href).map_err(|_| unreadable())?;
    target
        .query_pairs()
        .find(|(key, _)| key == layout.page_param)
        .and_then(|(_, value)| value.trim().parse::<u32>().ok())
        .ok_or_else(unreadable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::medikamio::MedikamioExtractor;
    use crate::scrapers::Extractor;
    use crate::test_utils::{index_page, FakeFetcher};

    const INDEX: &str = "https://medikamio.test/en-gb/diseases/index";

    fn locale() -> Locale {
        Locale::new("EN", INDEX)
    }

    fn site() -> Url {
        Url::parse("https://medikamio.test").unwrap()
    }

    #[test]
    fn test_page_count_reads_last_item() {
        let html = index_page("/en-gb/diseases/index", 5, &["/en-gb/diseases/a"]);
        let document = Html::parse_document(&html);
        let extractor = MedikamioExtractor;
        let layout = extractor.index_layout();
        assert_eq!(page_count(&document, layout, &locale()).unwrap(), 5);
    }

    #[test]
    fn test_missing_pagination_is_error() {
        let document = Html::parse_document("<ul><li class=\"index-hits-item\"></li></ul>");
        let extractor = MedikamioExtractor;
        let layout = extractor.index_layout();
        assert!(matches!(
            page_count(&document, layout, &locale()),
            Err(PaginationError::NoPagination { .. })
        ));
    }

    #[test]
    fn test_unreadable_page_number_is_error() {
        let document = Html::parse_document(
            r#"<ul><li class="ais-Pagination-item"><a href="/index?page=last">»</a></li></ul>"#,
        );
        let extractor = MedikamioExtractor;
        let layout = extractor.index_layout();
        assert!(matches!(
            page_count(&document, layout, &locale()),
            Err(PaginationError::UnreadablePageNumber { .. })
        ));
    }

    #[tokio::test]
    async fn test_walk_stops_one_page_short() {
        let mut fetcher = FakeFetcher::default();
        fetcher.insert(INDEX, index_page("/en-gb/diseases/index", 5, &["/d/p1"]));
        for page in 2..=5 {
            fetcher.insert(
                &format!("{INDEX}?page={page}"),
                index_page("/en-gb/diseases/index", 5, &[&format!("/d/p{page}")]),
            );
        }

        let site = site();
        let extractor = MedikamioExtractor;
        let walker = PaginationWalker::new(&fetcher, extractor.index_layout(), &site);
        let index = walker.discover_page_count(&locale()).await.unwrap();
        assert_eq!(index.page_count, 5);
        assert_eq!(index.pages().collect::<Vec<_>>(), vec![1, 2, 3, 4]);

        let mut urls = Vec::new();
        for page in index.pages() {
            urls.extend(walker.urls_on_page(&index, page).await.unwrap());
        }

        assert_eq!(
            urls,
            vec![
                "https://medikamio.test/d/p1",
                "https://medikamio.test/d/p2",
                "https://medikamio.test/d/p3",
                "https://medikamio.test/d/p4",
            ]
        );
        assert_eq!(
            fetcher.requests(),
            vec![
                INDEX.to_string(),
                format!("{INDEX}?page=2"),
                format!("{INDEX}?page=3"),
                format!("{INDEX}?page=4"),
            ]
        );
    }

    #[tokio::test]
    async fn test_index_fetch_failure_propagates() {
        let fetcher = FakeFetcher::default();
        let site = site();
        let extractor = MedikamioExtractor;
        let walker = PaginationWalker::new(&fetcher, extractor.index_layout(), &site);
        let err = walker.discover_page_count(&locale()).await.unwrap_err();
        assert!(matches!(err, CrawlError::Fetch(_)));
    }
}
