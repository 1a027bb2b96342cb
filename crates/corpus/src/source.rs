use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::DatasetError;
use crate::record::TextRecord;

/// Where the raw records come from.
///
/// Reads are sequential and read-only. Implementations should be cheap to
/// query for their size; [`DatasetSource::total_chars`] is allowed to be slow
/// since it is only used when the caller has no precomputed count.
pub trait DatasetSource {
    /// Number of records in the full dataset.
    fn len(&self) -> Result<usize, DatasetError>;

    fn is_empty(&self) -> Result<bool, DatasetError> {
        Ok(self.len()? == 0)
    }

    /// The first `n` records, in source order.
    fn take(&self, n: usize) -> Result<Vec<TextRecord>, DatasetError>;

    /// Character count of every record's text. Scans the whole dataset.
    fn total_chars(&self) -> Result<u64, DatasetError>;
}

/// Records to process for a given `down_scale` fraction: `floor(total * down_scale)`.
pub fn sample_size(total_records: usize, down_scale: f64) -> usize {
    (total_records as f64 * down_scale).floor() as usize
}

/// Dataset held in memory. Handy for tests and small corpora.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    records: Vec<TextRecord>,
}

impl InMemoryDataset {
    pub fn new(records: Vec<TextRecord>) -> Self {
        Self { records }
    }
}

impl<T: Into<TextRecord>> FromIterator<T> for InMemoryDataset {
    fn from_iter<It: IntoIterator<Item = T>>(iter: It) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

impl DatasetSource for InMemoryDataset {
    fn len(&self) -> Result<usize, DatasetError> {
        Ok(self.records.len())
    }

    fn take(&self, n: usize) -> Result<Vec<TextRecord>, DatasetError> {
        Ok(self.records.iter().take(n).cloned().collect())
    }

    fn total_chars(&self) -> Result<u64, DatasetError> {
        Ok(self.records.iter().map(TextRecord::char_len).sum())
    }
}

/// JSON-lines dataset: one object per line, each with a `text` field.
///
/// Blank lines are skipped and do not count as records.
#[derive(Debug, Clone)]
pub struct JsonlDataset {
    path: PathBuf,
}

impl JsonlDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<BufReader<File>, DatasetError> {
        File::open(&self.path)
            .map(BufReader::new)
            .map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> DatasetError {
        DatasetError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Visit decoded records in order until `visit` returns `false`.
    fn scan<F>(&self, mut visit: F) -> Result<(), DatasetError>
    where
        F: FnMut(TextRecord) -> bool,
    {
        for (idx, line) in self.open()?.lines().enumerate() {
            let line = line.map_err(|source| self.io_error(source))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: TextRecord = serde_json::from_str(&line)
                .map_err(|source| DatasetError::MalformedRecord {
                    line: idx + 1,
                    source,
                })?;
            if !visit(record) {
                break;
            }
        }
        Ok(())
    }
}

impl DatasetSource for JsonlDataset {
    fn len(&self) -> Result<usize, DatasetError> {
        let mut count = 0usize;
        for line in self.open()?.lines() {
            let line = line.map_err(|source| self.io_error(source))?;
            if !line.trim().is_empty() {
                count += 1;
            }
        }
        debug!(path = %self.path.display(), records = count, "dataset_len");
        Ok(count)
    }

    fn take(&self, n: usize) -> Result<Vec<TextRecord>, DatasetError> {
        let mut out = Vec::with_capacity(n.min(1 << 16));
        if n == 0 {
            return Ok(out);
        }
        self.scan(|record| {
            out.push(record);
            out.len() < n
        })?;
        Ok(out)
    }

    fn total_chars(&self) -> Result<u64, DatasetError> {
        let mut total = 0u64;
        self.scan(|record| {
            total += record.char_len();
            true
        })?;
        Ok(total)
    }
}
