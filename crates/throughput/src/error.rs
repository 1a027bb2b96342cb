use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while validating inputs or deriving run statistics.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    /// `down_scale` must be a finite number in `(0, 1]`.
    #[error("down_scale must be in (0, 1], got {0}")]
    InvalidScale(f64),
    #[error("run duration must be positive")]
    ZeroDuration,
    /// Fewer characters than seconds elapsed: the rate floors to zero and the
    /// full-corpus extrapolation would divide by zero.
    #[error("throughput floored to 0 chars/s ({total_chars} chars in {duration_secs:.3}s)")]
    NoThroughput { total_chars: u64, duration_secs: f64 },
    /// A result does not belong to the batch it was paired with.
    #[error("batch {index}: {detail}")]
    Mismatch { index: u64, detail: String },
}

/// Errors raised while appending to or reading the results log.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("results log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("results log {path} line {line}: {source}")]
    Decode {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode run statistics: {0}")]
    Encode(#[from] serde_json::Error),
}
