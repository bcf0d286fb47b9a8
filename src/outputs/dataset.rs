//! CSV output dataset.
//!
//! The dataset has a fixed column list written once as the header row when
//! the file is created. Afterwards rows are only ever appended. Each row is
//! serialized in memory and written with a single `write_all` while the
//! file lock is held.
//!
//! An existing dataset whose last row lacks its line terminator (the previous
//! run died mid-write) is terminated before anything is appended. After a
//! failed append the writer is closed for good, so a retry can never repeat
//! or splice a partially written row.

use crate::errors::PersistenceError;
use crate::models::Record;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

pub struct DatasetWriter {
    path: PathBuf,
    columns: Vec<String>,
    /// `None` once an append has failed.
    file: Mutex<Option<File>>,
}

impl DatasetWriter {
    /// Create the dataset with its header if needed, then open it for append.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path, columns: Vec<String>) -> Result<Self, PersistenceError> {
        init_if_absent(path, &columns)?;
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(path)
            .map_err(|source| io_error(path, source))?;
        if terminate_last_row(&mut file).map_err(|source| io_error(path, source))? {
            warn!("Last row had no line terminator, closed it before appending");
        }
        Ok(Self {
            path: path.to_path_buf(),
            columns,
            file: Mutex::new(Some(file)),
        })
    }

    /// A writer over a read-only handle, so every append fails.
    #[cfg(test)]
    pub fn read_only_for_tests(path: &Path, columns: Vec<String>) -> Self {
        let file = File::open(path).unwrap();
        Self {
            path: path.to_path_buf(),
            columns,
            file: Mutex::new(Some(file)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a row.
    ///
    /// Columns missing from the record are written empty and fields outside
    /// the schema are dropped. Concurrent calls are serialized.
    pub fn append(&self, record: &Record) -> Result<(), PersistenceError> {
        let line = serialize_row(&record.to_row(&self.columns))
            .map_err(|source| csv_error(&self.path, source))?;

        // A poisoned lock only means another append panicked; the file
        // itself holds whole rows.
        let mut guard = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(file) = guard.as_mut() else {
            return Err(PersistenceError::Closed {
                path: self.path.clone(),
            });
        };
        let written = file.write_all(&line).and_then(|()| file.flush());
        if let Err(source) = written {
            *guard = None;
            error!(path = %self.path.display(), error = %source, "Closing dataset after failed append");
            return Err(io_error(&self.path, source));
        }
        debug!(url = %record.url(), "Appended row");
        Ok(())
    }
}

/// One CSV row, terminator included.
fn serialize_row(row: &[String]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(row)?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Write a line terminator if the file is non-empty and does not end in one.
fn terminate_last_row(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(false);
    }
    // Append mode: this lands at the end whatever the cursor says.
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(true)
}

/// Create `path` holding only the header row, unless it already has content.
///
/// Returns whether the header was written. Calling it again is a no-op.
pub fn init_if_absent(path: &Path, columns: &[String]) -> Result<bool, PersistenceError> {
    let has_content = match fs::metadata(path) {
        Ok(meta) => meta.len() > 0,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(io_error(path, e)),
    };
    if has_content {
        return Ok(false);
    }

    let mut writer = csv::Writer::from_path(path).map_err(|source| csv_error(path, source))?;
    writer
        .write_record(columns)
        .map_err(|source| csv_error(path, source))?;
    writer.flush().map_err(|source| io_error(path, source))?;
    info!(path = %path.display(), columns = columns.len(), "Initialized dataset header");
    Ok(true)
}

fn io_error(path: &Path, source: io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_error(path: &Path, source: csv::Error) -> PersistenceError {
    PersistenceError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupStore;
    use std::sync::Arc;

    fn columns() -> Vec<String> {
        ["URL", "Language", "Disease", "Basics"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let headers = reader.headers().unwrap().iter().map(String::from).collect();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();
        (headers, rows)
    }

    #[test]
    fn test_init_if_absent_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        assert!(init_if_absent(&path, &columns()).unwrap());
        assert!(!init_if_absent(&path, &columns()).unwrap());

        let (headers, rows) = read_rows(&path);
        assert_eq!(headers, columns());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_empty_file_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        File::create(&path).unwrap();

        assert!(init_if_absent(&path, &columns()).unwrap());
        assert_eq!(read_rows(&path).0, columns());
    }

    #[test]
    fn test_append_fills_missing_columns_and_drops_extras() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let writer = DatasetWriter::open(&path, columns()).unwrap();

        let mut record = Record::new("https://medikamio.test/d/flu", "EN", "Disease", "Flu");
        record.insert("Unknown field", "x");
        writer.append(&record).unwrap();

        let (headers, rows) = read_rows(&path);
        assert_eq!(headers.len(), 4);
        assert_eq!(
            rows,
            vec![vec!["https://medikamio.test/d/flu", "EN", "Flu", ""]]
        );

        let (store, _) = DedupStore::load(&path).unwrap();
        assert!(store.contains("https://medikamio.test/d/flu"));
    }

    #[test]
    fn test_reopen_appends_after_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let writer = DatasetWriter::open(&path, columns()).unwrap();
        writer.append(&Record::new("a", "EN", "Disease", "A")).unwrap();
        drop(writer);

        let writer = DatasetWriter::open(&path, columns()).unwrap();
        writer.append(&Record::new("b", "DE", "Disease", "B")).unwrap();

        let (_, rows) = read_rows(&path);
        let urls: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(urls, vec!["a", "b"]);
    }

    #[test]
    fn test_concurrent_appends_write_whole_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let writer = Arc::new(DatasetWriter::open(&path, columns()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let writer = Arc::clone(&writer);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let mut record =
                            Record::new(&format!("u-{t}-{i}"), "EN", "Disease", "Title, with comma");
                        record.insert("Basics", "line one\nline two");
                        writer.append(&record).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let (_, rows) = read_rows(&path);
        assert_eq!(rows.len(), 200);
        assert!(rows.iter().all(|r| r.len() == 4 && r[3] == "line one\nline two"));
    }

    #[test]
    fn test_unterminated_last_row_is_closed_before_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "URL,Language,Disease,Basics\nhttps://m.test/a,EN,A,x").unwrap();

        let writer = DatasetWriter::open(&path, columns()).unwrap();
        writer.append(&Record::new("https://m.test/b", "DE", "Disease", "B")).unwrap();

        let (_, rows) = read_rows(&path);
        let urls: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(urls, vec!["https://m.test/a", "https://m.test/b"]);

        let (store, _) = DedupStore::load(&path).unwrap();
        assert!(store.contains("https://m.test/a"));
        assert!(store.contains("https://m.test/b"));
    }

    #[test]
    fn test_terminated_dataset_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "URL,Language,Disease,Basics\na,EN,A,x\n").unwrap();

        drop(DatasetWriter::open(&path, columns()).unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "URL,Language,Disease,Basics\na,EN,A,x\n"
        );
    }

    #[test]
    fn test_failed_append_closes_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readonly.csv");
        fs::write(&path, "URL\n").unwrap();
        let writer = DatasetWriter::read_only_for_tests(&path, vec!["URL".to_string()]);

        let first = writer.append(&Record::new("a", "EN", "Disease", "A"));
        assert!(matches!(first, Err(PersistenceError::Io { .. })));

        let second = writer.append(&Record::new("b", "EN", "Disease", "B"));
        assert!(matches!(second, Err(PersistenceError::Closed { .. })));

        assert_eq!(fs::read_to_string(&path).unwrap(), "URL\n");
    }
}
