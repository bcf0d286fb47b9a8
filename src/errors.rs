//! Error taxonomy for the crawl.
//!
//! Errors are split by blast radius:
//!
//! | Error | Scope | Handling |
//! |-------|-------|----------|
//! | [`FetchError`] | one URL | routed to the error log |
//! | [`ExtractionError`] | one URL | routed to the error log |
//! | [`PaginationError`] | one locale | locale walk stops, others continue |
//! | [`PersistenceError`] | whole run | admission stops, run drains and fails |
//! | [`ConfigError`] | startup | process exits before crawling |

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Network or transport failure while retrieving a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} returned non-HTML content ({content_type})")]
    NotHtml { url: String, content_type: String },
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// A detail page lacked a structural anchor the extractor relies on.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{url} has no `{anchor}` element")]
    MissingAnchor { url: String, anchor: &'static str },
}

/// The index page of a locale could not be paginated.
#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("no pagination control on {url} (locale {locale})")]
    NoPagination { locale: String, url: String },
    #[error("unreadable page number in `{href}` (locale {locale})")]
    UnreadablePageNumber { locale: String, href: String },
}

/// Reading or writing the output dataset failed at the I/O level.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("dataset {} was closed by an earlier write failure", path.display())]
    Closed { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse config {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Umbrella error for everything a crawl run can observe.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl CrawlError {
    /// True for failures that only concern the URL being processed.
    pub fn is_url_scoped(&self) -> bool {
        matches!(self, CrawlError::Fetch(_) | CrawlError::Extraction(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_scoped_classification() {
        let fetch: CrawlError = FetchError::Status {
            url: "https://example.com/a".to_string(),
            status: 500,
        }
        .into();
        let extraction: CrawlError = ExtractionError::MissingAnchor {
            url: "https://example.com/a".to_string(),
            anchor: "h1.title",
        }
        .into();
        let persistence: CrawlError = PersistenceError::Io {
            path: PathBuf::from("out.csv"),
            source: io::Error::other("disk full"),
        }
        .into();

        assert!(fetch.is_url_scoped());
        assert!(extraction.is_url_scoped());
        assert!(!persistence.is_url_scoped());
    }

    #[test]
    fn test_display_names_the_url() {
        let err: CrawlError = FetchError::NotHtml {
            url: "https://example.com/feed".to_string(),
            content_type: "application/json".to_string(),
        }
        .into();
        let message = err.to_string();
        assert!(message.contains("https://example.com/feed"));
        assert!(message.contains("application/json"));
    }
}
