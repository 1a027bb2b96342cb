//! Workspace umbrella crate for the embedding throughput benchmark.
//!
//! A run reads a down-scaled sample of a text corpus, chunks and batches it,
//! pushes every batch through a warmed-up pool of embedding workers, and
//! reports characters per second along with a projection for the full corpus.
//!
//! ## Pipeline
//!
//! 1. [`BenchConfig`] is loaded and validated (`down_scale` included) before
//!    anything touches the dataset or starts a worker.
//! 2. `corpus` samples `floor(records * down_scale)` records, then chunks and
//!    batches them. Batches are materialized up front so dispatch timing
//!    covers inference only.
//! 3. `dispatch` warms up the [`WorkerPool`] and runs one ordered dispatch,
//!    timed once around the whole call.
//! 4. `throughput` sums characters over the ordered results and derives
//!    [`RunStatistics`], which are appended to the results log.

pub mod config;
mod driver;
mod publish;

pub use crate::config::{BenchConfig, ConfigError, LoggingConfig, PoolSection, RunConfig, WorkerConfig};
pub use crate::driver::{run_benchmark, RunError};
pub use crate::publish::publish_embeddings;

pub use corpus::{
    batch_corpus, chunk_text, Batch, Batcher, ChunkingError, Chunker, DatasetError, DatasetSource,
    InMemoryDataset, JsonlDataset, TextRecord,
};
pub use dispatch::{
    DispatchError, EmbeddingResult, InferenceClient, PoolConfig, RpcError, WorkerPool,
};
pub use throughput::{
    compute_statistics, format_hms, DownScale, RunStatistics, StatsError, ThroughputAggregator,
};
