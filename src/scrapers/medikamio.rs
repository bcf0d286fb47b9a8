//! Medikamio disease catalog.
//!
//! Detail pages look like
//!
//! ```html
//! <h1 class="title">Influenza</h1>
//! <table><tr><td>International Classification (ICD)</td><td>J11</td></tr></table>
//! <section class="content blog-content">
//!   <h2> Symptoms </h2>
//!   <div>Fever, cough, ...</div>
//! </section>
//! ```
//!
//! Every two-cell table row becomes a field, then every content section
//! becomes a field named after its trimmed heading. Cell and body text is
//! kept as is. Later fields overwrite earlier ones with the same name.

use super::{element_text, Extractor, IndexLayout};
use crate::errors::ExtractionError;
use crate::models::{Locale, Record, LANGUAGE_FIELD, URL_FIELD};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;

pub const TITLE_FIELD: &str = "Disease";

pub const COLUMNS: [&str; 23] = [
    "URL",
    "Language",
    "Disease",
    "International Classification (ICD)",
    "Basics",
    "Causes",
    "Symptoms",
    "Diagnosis",
    "Therapy",
    "Forecast",
    "Prevent",
    "Tips",
    "Possible risk factors",
    "Possible causes",
    "Lifestyle change (without medication)",
    "Hypertension and (very) high overall risk",
    "Diabetes (according to European Society of Hypertension)",
    "High blood pressure",
    "Severe kidney disease (>1g/d protein in urine)",
    "Good blood pressure control, low to moderate risk",
    "Good blood pressure control, high risk",
    "CHD, stroke, TIA, kidney disease",
    "Start of therapy",
];

const TITLE_SELECTOR: &str = "h1.title";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static TITLE: Lazy<Selector> = Lazy::new(|| selector(TITLE_SELECTOR));
static ROW: Lazy<Selector> = Lazy::new(|| selector("tr"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td"));
static SECTION: Lazy<Selector> = Lazy::new(|| selector("section.content.blog-content"));
static SECTION_HEADING: Lazy<Selector> = Lazy::new(|| selector("h2"));
static SECTION_BODY: Lazy<Selector> = Lazy::new(|| selector("div"));

static INDEX_LAYOUT: Lazy<IndexLayout> = Lazy::new(|| IndexLayout {
    pagination_item: selector("li.ais-Pagination-item"),
    hit_link: selector("li.index-hits-item a[href]"),
    page_param: "page",
});

#[derive(Debug, Default, Clone, Copy)]
pub struct MedikamioExtractor;

impl MedikamioExtractor {
    fn insert_field(record: &mut Record, name: &str, value: &str) {
        // The identity columns always come from the crawl itself.
        if name.is_empty() || name == URL_FIELD || name == LANGUAGE_FIELD {
            return;
        }
        record.insert(name, value);
    }
}

impl Extractor for MedikamioExtractor {
    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    fn index_layout(&self) -> &IndexLayout {
        &INDEX_LAYOUT
    }

    fn extract(
        &self,
        locale: &Locale,
        url: &str,
        document: &Html,
    ) -> Result<Record, ExtractionError> {
        let title = document
            .select(&TITLE)
            .next()
            .ok_or_else(|| ExtractionError::MissingAnchor {
                url: url.to_string(),
                anchor: TITLE_SELECTOR,
            })?;
        let mut record = Record::new(url, &locale.tag, TITLE_FIELD, element_text(title).trim());

        for row in document.select(&ROW) {
            let cells: Vec<_> = row.select(&CELL).collect();
            if let [name, value] = cells.as_slice() {
                Self::insert_field(&mut record, &element_text(*name), &element_text(*value));
            }
        }

        for section in document.select(&SECTION) {
            let heading = section.select(&SECTION_HEADING).next();
            let body = section.select(&SECTION_BODY).next();
            match (heading, body) {
                (Some(heading), Some(body)) => {
                    let name = element_text(heading);
                    Self::insert_field(&mut record, name.trim(), &element_text(body));
                }
                _ => debug!(%url, "Skipping content section without heading or body"),
            }
        }

        Ok(record)
    }
}
