use std::time::Duration;

use corpus::Batch;
use dispatch::EmbeddingResult;
use tracing::info;

use crate::error::StatsError;
use crate::stats::{compute_statistics, RunStatistics};

/// Running totals over the ordered `(Batch, EmbeddingResult)` stream.
///
/// Duration is not accumulated here: batches overlap in time, so the caller
/// measures the whole dispatch once and passes it to [`finish`](Self::finish).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ThroughputAggregator {
    batches: u64,
    chunks: u64,
    total_chars: u64,
}

impl ThroughputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one batch and its result.
    pub fn record(&mut self, batch: &Batch, result: &EmbeddingResult) -> Result<(), StatsError> {
        if result.len() != batch.len() {
            return Err(StatsError::Mismatch {
                index: batch.index,
                detail: format!("{} embeddings for {} chunks", result.len(), batch.len()),
            });
        }
        let expected = batch.n_chars();
        if result.n_chars != expected {
            return Err(StatsError::Mismatch {
                index: batch.index,
                detail: format!("result covers {} chars, batch has {expected}", result.n_chars),
            });
        }
        self.batches += 1;
        self.chunks += batch.len() as u64;
        self.total_chars += result.n_chars;
        Ok(())
    }

    /// Record a whole ordered stream.
    pub fn extend<'a, I>(&mut self, pairs: I) -> Result<(), StatsError>
    where
        I: IntoIterator<Item = (&'a Batch, &'a EmbeddingResult)>,
    {
        pairs
            .into_iter()
            .try_for_each(|(batch, result)| self.record(batch, result))
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn total_chars(&self) -> u64 {
        self.total_chars
    }

    /// Close the run with the dispatch wall-clock time.
    pub fn finish(
        &self,
        duration: Duration,
        down_scale: f64,
        corpus_chars: u64,
        n_gpu: usize,
    ) -> Result<RunStatistics, StatsError> {
        let stats = compute_statistics(self.total_chars, duration, down_scale, corpus_chars, n_gpu)?;
        info!(
            batches = self.batches,
            chunks = self.chunks,
            total_chars = self.total_chars,
            duration_secs = stats.duration,
            characters_per_second = stats.characters_per_second,
            extrapolated = %stats.extrapolated_duration_fmt,
            extrapolated_tps = %stats.extrapolated_duration_tps_fmt,
            "run_statistics"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(index: u64, chunks: &[&str]) -> (Batch, EmbeddingResult) {
        let batch = Batch::new(index, chunks.iter().map(|c| c.to_string()).collect());
        let result = EmbeddingResult {
            embeddings: vec![vec![0.0; 4]; chunks.len()],
            n_chars: batch.n_chars(),
        };
        (batch, result)
    }

    #[test]
    fn sums_characters_across_batches() {
        let pairs = vec![pair(0, &["abc", "de"]), pair(1, &["héllo"])];
        let mut agg = ThroughputAggregator::new();
        agg.extend(pairs.iter().map(|(b, r)| (b, r))).unwrap();

        assert_eq!(agg.batches(), 2);
        assert_eq!(agg.chunks(), 3);
        assert_eq!(agg.total_chars(), 10);
    }

    #[test]
    fn rejects_misaligned_result() {
        let (batch, mut result) = pair(3, &["a", "b"]);
        result.embeddings.pop();
        let err = ThroughputAggregator::new().record(&batch, &result).unwrap_err();
        assert!(matches!(err, StatsError::Mismatch { index: 3, .. }));
    }

    #[test]
    fn finish_uses_the_single_dispatch_duration() {
        let chunk = "x".repeat(500);
        let chunks: Vec<&str> = vec![chunk.as_str(); 100];
        let (batch, result) = pair(0, &chunks);
        let mut agg = ThroughputAggregator::new();
        agg.record(&batch, &result).unwrap();

        let stats = agg
            .finish(Duration::from_secs(10), 0.001, 50_000_000, 6)
            .unwrap();
        assert_eq!(stats.characters_per_second, 5000);
        assert_eq!(stats.extrapolated_duration_fmt, "2:46:40");
    }
}
