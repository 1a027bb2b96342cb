use serde::{Deserialize, Serialize};

use crate::chunker::{char_len, Chunk};
use crate::error::ChunkingError;

/// An ordered group of chunks bound for a single inference request.
///
/// `index` is assigned at creation, starting at 0, and is the key the
/// dispatcher reorders results by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub index: u64,
    pub chunks: Vec<Chunk>,
}

impl Batch {
    pub fn new(index: u64, chunks: Vec<Chunk>) -> Self {
        Self { index, chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total character count across all chunks.
    pub fn n_chars(&self) -> u64 {
        self.chunks.iter().map(|c| char_len(c) as u64).sum()
    }
}

/// Groups a chunk stream into fixed-size [`Batch`]es.
///
/// Every batch holds exactly `batch_size` chunks except possibly the last,
/// which holds the remainder. An exhausted input never produces an empty batch.
#[derive(Debug)]
pub struct Batcher<I> {
    chunks: I,
    batch_size: usize,
    next_index: u64,
    done: bool,
}

impl<I> Batcher<I>
where
    I: Iterator<Item = Chunk>,
{
    pub fn new<C>(chunks: C, batch_size: usize) -> Result<Self, ChunkingError>
    where
        C: IntoIterator<IntoIter = I>,
    {
        if batch_size == 0 {
            return Err(ChunkingError::ZeroBatchSize);
        }
        Ok(Self {
            chunks: chunks.into_iter(),
            batch_size,
            next_index: 0,
            done: false,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl<I> Iterator for Batcher<I>
where
    I: Iterator<Item = Chunk>,
{
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.done {
            return None;
        }

        let chunks: Vec<Chunk> = self.chunks.by_ref().take(self.batch_size).collect();
        if chunks.len() < self.batch_size {
            self.done = true;
        }
        if chunks.is_empty() {
            return None;
        }

        let index = self.next_index;
        self.next_index += 1;
        Some(Batch { index, chunks })
    }
}

impl<I> std::iter::FusedIterator for Batcher<I> where I: Iterator<Item = Chunk> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n).map(|i| format!("chunk{i}")).collect()
    }

    #[test]
    fn batching_small() {
        let batches: Vec<Batch> = Batcher::new(chunks(5), 3).unwrap().collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(batches[1].len(), 2);
    }

    #[test]
    fn batching_exact_size() {
        let batches: Vec<Batch> = Batcher::new(chunks(10), 5).unwrap().collect();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 5));
    }

    #[test]
    fn batching_empty() {
        let mut batcher = Batcher::new(Vec::<Chunk>::new(), 100).unwrap();
        assert!(batcher.next().is_none());
        assert!(batcher.next().is_none());
    }

    #[test]
    fn indexes_are_sequential_from_zero() {
        let indexes: Vec<u64> = Batcher::new(chunks(10), 3)
            .unwrap()
            .map(|b| b.index)
            .collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn completeness_over_random_inputs() {
        fastrand::seed(42);
        for _ in 0..200 {
            let n = fastrand::usize(0..1_000);
            let batch_size = fastrand::usize(1..150);
            let input = chunks(n);

            let batches: Vec<Batch> = Batcher::new(input.clone(), batch_size).unwrap().collect();

            let total: usize = batches.iter().map(Batch::len).sum();
            assert_eq!(total, n);
            assert!(batches.iter().all(|b| !b.is_empty()));
            if let Some((_, body)) = batches.split_last() {
                assert!(body.iter().all(|b| b.len() == batch_size));
            }
            let flattened: Vec<Chunk> = batches.into_iter().flat_map(|b| b.chunks).collect();
            assert_eq!(flattened, input);
        }
    }

    #[test]
    fn n_chars_counts_characters() {
        let batch = Batch::new(0, vec!["añb".into(), "🦀".into()]);
        assert_eq!(batch.n_chars(), 4);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert_eq!(
            Batcher::new(chunks(3), 0).unwrap_err(),
            ChunkingError::ZeroBatchSize
        );
    }
}
