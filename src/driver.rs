use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use corpus::{batch_corpus, sample_size, Batch, ChunkingError, DatasetError, DatasetSource};
use dispatch::{retry_async, DispatchError, EmbeddingResult, RetryConfig, WorkerPool};
use thiserror::Error;
use throughput::{append_report, ReportError, RunStatistics, StatsError, ThroughputAggregator};
use tracing::{info, info_span, Instrument};

use crate::config::{BenchConfig, ConfigError};
use crate::publish::publish_embeddings;

/// A benchmark run aborted. Each variant names the component that failed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("dataset: {0}")]
    Dataset(#[from] DatasetError),
    #[error("chunking: {0}")]
    Chunking(#[from] ChunkingError),
    #[error("worker pool: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("throughput: {0}")]
    Stats(#[from] StatsError),
    #[error("results log: {0}")]
    Report(#[from] ReportError),
    #[error("publish to {path}: {source}")]
    Publish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RunError {
    pub fn component(&self) -> &'static str {
        match self {
            RunError::Config(_) => "config",
            RunError::Dataset(_) => "dataset",
            RunError::Chunking(_) => "chunker",
            RunError::Dispatch(_) => "worker_pool",
            RunError::Stats(_) => "throughput",
            RunError::Report(_) => "report",
            RunError::Publish { .. } => "publish",
        }
    }
}

/// Run one benchmark end to end and append its statistics to the results log.
///
/// Configuration, including `down_scale`, is validated before the dataset is
/// read or any worker is started. Nothing is appended for a failed run.
pub async fn run_benchmark(
    config: &BenchConfig,
    source: &dyn DatasetSource,
) -> Result<RunStatistics, RunError> {
    config.validate()?;
    let down_scale = config.down_scale()?;
    let span = info_span!("benchmark", down_scale = down_scale.get());

    async move {
        let total_records = source.len()?;
        let sample = sample_size(total_records, down_scale.get());
        info!(total_records, sample, "dataset_loaded");

        let corpus_chars = match config.run.corpus_chars {
            Some(chars) => chars,
            None => {
                let start = Instant::now();
                let chars = source.total_chars()?;
                info!(
                    corpus_chars = chars,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "corpus_scanned"
                );
                chars
            }
        };

        let records = source.take(sample)?;
        let start = Instant::now();
        let batches: Vec<Batch> =
            batch_corpus(records, config.run.chunk_size, config.run.batch_size)?.collect();
        info!(
            batches = batches.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batches_materialized"
        );
        if batches.is_empty() {
            return Err(DatasetError::EmptySample {
                sample,
                total_records,
            }
            .into());
        }

        let pool = start_pool(config).await?;
        let n_gpu = pool.workers().len();

        let outcome = dispatch_all(&pool, &batches, config.run.dispatch_retries).await;
        pool.shutdown().await;
        let (results, duration) = outcome?;

        let mut aggregator = ThroughputAggregator::new();
        aggregator.extend(batches.iter().zip(&results))?;
        let stats = aggregator.finish(duration, down_scale.get(), corpus_chars, n_gpu)?;

        append_report(&config.run.results_log, &stats)?;
        if let Some(path) = &config.run.publish {
            publish_embeddings(path, &batches, &results).map_err(|source| RunError::Publish {
                path: path.clone(),
                source,
            })?;
        }
        Ok::<_, RunError>(stats)
    }
    .instrument(span)
    .await
}

async fn start_pool(config: &BenchConfig) -> Result<WorkerPool, DispatchError> {
    let pool_config = config.pool_config();
    if config.worker.endpoints.is_empty() {
        WorkerPool::launch(
            pool_config,
            &config.launch_spec(),
            &config.worker.host,
            config.worker.base_port,
        )
        .await
    } else {
        WorkerPool::attach(pool_config, &config.worker.endpoints).await
    }
}

/// Dispatch every batch, re-running the whole dispatch on retryable
/// failures. Returns the results with the duration of the attempt that
/// produced them; failed attempts and backoff are not timed.
async fn dispatch_all(
    pool: &WorkerPool,
    batches: &[Batch],
    retries: u32,
) -> Result<(Vec<EmbeddingResult>, Duration), DispatchError> {
    let timed = move || async move {
        let start = Instant::now();
        let results = pool.dispatch_ordered(batches.iter().cloned()).await?;
        Ok::<_, DispatchError>((results, start.elapsed()))
    };
    if retries == 0 {
        return timed().await;
    }
    let retry = RetryConfig::default().with_max_retries(retries);
    let outcome = retry_async(&retry, DispatchError::is_retryable, |_| timed()).await;
    info!(
        attempts = outcome.attempts,
        total_ms = outcome.total_duration.as_millis() as u64,
        "dispatch_attempts"
    );
    outcome.into_result()
}
