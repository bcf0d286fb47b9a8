//! Append-only log of URLs whose processing failed.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, instrument};

/// Records failed URLs, one per line, for later inspection or retry.
///
/// Writing here never fails the caller: an I/O error is logged and dropped.
#[derive(Debug)]
pub struct ErrorSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ErrorSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[instrument(level = "debug", skip(self))]
    pub fn record(&self, url: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{url}"));
        if let Err(e) = result {
            error!(path = %self.path.display(), error = %e, "Failed to record failed URL");
        }
    }
}
