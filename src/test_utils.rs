//! In-memory fixtures shared by the unit tests.

use crate::errors::FetchError;
use crate::fetch::Fetch;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// A [`Fetch`] serving canned pages.
///
/// Unknown URLs answer with HTTP 404. Fetches of URLs starting with
/// `slow_prefix` sleep for `delay` first, and fetching `panic_url` panics.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
    slow_prefix: Option<String>,
    delay: Duration,
    panic_url: Option<String>,
}

impl FakeFetcher {
    pub fn insert(&mut self, url: &str, body: String) {
        self.pages.insert(url.to_string(), body);
    }

    pub fn slow(mut self, prefix: &str, delay: Duration) -> Self {
        self.slow_prefix = Some(prefix.to_string());
        self.delay = delay;
        self
    }

    pub fn panic_on(mut self, url: &str) -> Self {
        self.panic_url = Some(url.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Fetch for FakeFetcher {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());

        if self.panic_url.as_deref() == Some(url) {
            panic!("fake fetcher told to panic on {url}");
        }
        let slow = self
            .slow_prefix
            .as_deref()
            .is_some_and(|prefix| url.starts_with(prefix));
        if slow {
            tokio::time::sleep(self.delay).await;
        }

        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// An index page listing `links` with pagination items `1..=page_count`
/// pointing at `{path}?page=n`.
pub fn index_page(path: &str, page_count: u32, links: &[&str]) -> String {
    let pagination: String = (1..=page_count)
        .map(|n| format!(r#"<li class="ais-Pagination-item"><a href="{path}?page={n}">{n}</a></li>"#))
        .collect();
    let hits: String = links
        .iter()
        .map(|href| format!(r#"<li class="index-hits-item"><a href="{href}">{href}</a></li>"#))
        .collect();
    format!("<html><body><ul>{hits}</ul><ul>{pagination}</ul></body></html>")
}

/// A detail page with a title and one two-cell table row.
pub fn detail_page(title: &str, basics: &str) -> String {
    format!(
        r#"<html><body><h1 class="title">{title}</h1>
        <table><tr><td>Basics</td><td>{basics}</td></tr></table></body></html>"#
    )
}
