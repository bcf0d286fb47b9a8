//! Site layouts.
//!
//! Everything that depends on how a particular catalog marks up its pages
//! lives behind the [`Extractor`] trait:
//!
//! - the fixed column schema of the output dataset,
//! - the selectors used on index pages ([`IndexLayout`]),
//! - the detail page → [`Record`] extraction.
//!
//! # Supported Sites
//!
//! | Site | Module | Title field |
//! |------|--------|-------------|
//! | Medikamio | [`medikamio`] | `Disease` |

use crate::errors::ExtractionError;
use crate::models::{Locale, Record};
use scraper::{ElementRef, Html, Selector};

pub mod medikamio;

/// Selectors used on the paginated index pages of a catalog.
#[derive(Debug)]
pub struct IndexLayout {
    /// One element per pagination entry; the last one links to the last page.
    pub pagination_item: Selector,
    /// Anchors pointing at detail pages.
    pub hit_link: Selector,
    /// Query parameter carrying the page number.
    pub page_param: &'static str,
}

/// Turns a catalog's pages into records.
pub trait Extractor: Send + Sync + 'static {
    /// Every field name this extractor may produce, in output column order.
    fn columns(&self) -> Vec<String>;

    fn index_layout(&self) -> &IndexLayout;

    /// Extract one detail page. Fails when the page lacks its title.
    fn extract(
        &self,
        locale: &Locale,
        url: &str,
        document: &Html,
    ) -> Result<Record, ExtractionError>;
}

/// Concatenated text content of an element, like the DOM `textContent`.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}
