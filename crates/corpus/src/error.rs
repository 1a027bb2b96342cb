use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors for the chunk/batch transforms.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,
    #[error("batch_size must be greater than zero")]
    ZeroBatchSize,
}

/// Errors raised while reading records out of a [`crate::DatasetSource`].
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The dataset file could not be opened or read.
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A line did not decode into a record with a `text` field.
    #[error("malformed record on line {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    /// The sampled records contain no text, so there is nothing to embed.
    #[error("sample of {sample} out of {total_records} records produced no chunks; raise down_scale")]
    EmptySample { sample: usize, total_records: usize },
}
