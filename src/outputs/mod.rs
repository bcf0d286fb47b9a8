//! Persistent outputs of a crawl.
//!
//! # Submodules
//!
//! - [`dataset`]: the CSV dataset, one row per scraped detail page
//! - [`error_log`]: plain text list of the URLs that failed
//!
//! # Output Structure
//!
//! ```text
//! Medikamio.csv   # header row, then one row per record, append-only
//! Error.txt       # one failed URL per line, no header
//! ```

pub mod dataset;
pub mod error_log;
