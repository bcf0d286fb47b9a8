//! Known-URL set used to skip work that is already persisted.
//!
//! At startup the `URL` column of the output dataset is read in full. During
//! the run the store tracks two things under one lock:
//!
//! - `seen`: URLs present in the dataset, including rows written this run
//! - `claimed`: URLs dispatched this run, whatever their outcome
//!
//! A URL is dispatched at most once per run, and never when a previous run
//! already persisted it. Resuming a crawl needs nothing else.

use crate::errors::PersistenceError;
use crate::models::URL_FIELD;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, instrument};

/// State of the output dataset when the store was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetState {
    /// No dataset yet; a header must be written before the first row.
    Missing,
    Existing { rows: usize },
}

#[derive(Debug, Default)]
struct Urls {
    seen: HashSet<String>,
    claimed: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct DedupStore {
    urls: Mutex<Urls>,
}

impl DedupStore {
    /// Read every URL already present in the dataset at `path`.
    ///
    /// A missing or empty file yields an empty store. Bytes that are not
    /// valid UTF-8 are replaced, and rows shorter than the header are
    /// tolerated.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<(Self, DatasetState), PersistenceError> {
        let empty = match std::fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if empty {
            info!("No existing dataset, starting fresh");
            return Ok((Self::default(), DatasetState::Missing));
        }

        let csv_error = |source| PersistenceError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(csv_error)?;
        let url_column = reader
            .byte_headers()
            .map_err(csv_error)?
            .iter()
            .position(|h| String::from_utf8_lossy(h).trim() == URL_FIELD)
            .unwrap_or(0);

        let mut seen = HashSet::new();
        let mut rows = 0;
        for record in reader.byte_records() {
            let record = record.map_err(csv_error)?;
            rows += 1;
            if let Some(url) = record.get(url_column) {
                let url = String::from_utf8_lossy(url);
                if !url.is_empty() {
                    seen.insert(url.into_owned());
                }
            }
        }

        info!(rows, known_urls = seen.len(), "Loaded already-scraped URLs");
        let store = Self {
            urls: Mutex::new(Urls {
                seen,
                claimed: HashSet::new(),
            }),
        };
        Ok((store, DatasetState::Existing { rows }))
    }

    fn lock(&self) -> MutexGuard<'_, Urls> {
        self.urls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether `url` is already persisted.
    pub fn contains(&self, url: &str) -> bool {
        self.lock().seen.contains(url)
    }

    /// Reserve `url` for dispatch. Returns `false` when it is already
    /// persisted or was dispatched earlier in this run.
    pub fn claim(&self, url: &str) -> bool {
        let mut urls = self.lock();
        if urls.seen.contains(url) {
            return false;
        }
        urls.claimed.insert(url.to_string())
    }

    /// Record that a row for `url` was written.
    pub fn mark_seen(&self, url: &str) {
        self.lock().seen.insert(url.to_string());
    }

    pub fn len(&self) -> usize {
        self.lock().seen.len()
    }
}
