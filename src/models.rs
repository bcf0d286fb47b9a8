//! Data models shared across the crawl.
//!
//! - [`Locale`]: a language variant of the catalog and its index page
//! - [`Record`]: the flat field map extracted from one detail page

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field holding the detail page URL. Always present, always non-empty.
pub const URL_FIELD: &str = "URL";
/// Field holding the locale tag the page was discovered under.
pub const LANGUAGE_FIELD: &str = "Language";

/// A configured language variant of the catalog.
///
/// The set of locales is fixed at startup; the scheduler walks them in the
/// order they were configured.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Locale {
    /// Opaque tag such as `"EN"`, written to the `Language` column.
    pub tag: String,
    /// First index page of this locale.
    pub index_url: String,
}

impl Locale {
    pub fn new(tag: impl Into<String>, index_url: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            index_url: index_url.into(),
        }
    }
}

/// One scraped detail page as field name → text value.
///
/// Inserting a field that already exists overwrites it, so later passes over
/// the document win over earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Create a record carrying the identity fields every row must have.
    pub fn new(url: &str, language: &str, title_field: &str, title: &str) -> Self {
        let mut record = Self::default();
        record.insert(URL_FIELD, url);
        record.insert(LANGUAGE_FIELD, language);
        record.insert(title_field, title);
        record
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn url(&self) -> &str {
        self.get(URL_FIELD).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Render this record against a fixed column list.
    ///
    /// Columns the record lacks become empty cells; fields outside the
    /// column list are dropped.
    pub fn to_row(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|column| self.get(column).unwrap_or_default().to_string())
            .collect()
    }
}
