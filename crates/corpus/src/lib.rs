//! Corpus side of an embedding run.
//!
//! Everything here is a pure, lazy transform over the dataset: records come in,
//! fixed-length chunks come out, and chunks get grouped into index-tagged
//! batches that the dispatch layer can ship to inference workers.
//!
//! ## What we do
//!
//! - **Read records** - [`DatasetSource`] hides where the text lives. We ship a
//!   JSON-lines reader and an in-memory source for tests.
//! - **Chunk** - [`Chunker`] slices each record's text into pieces of at most
//!   `chunk_size` characters. No overlap, nothing dropped, nothing duplicated.
//! - **Batch** - [`Batcher`] groups chunks into [`Batch`]es of `batch_size`,
//!   stamping each with a sequence index starting at 0. That index is what the
//!   dispatcher uses to put results back in order.
//!
//! Lengths are counted in `char`s, never bytes, so a chunk boundary can't land
//! in the middle of a multi-byte character.
//!
//! ## Example
//!
//! ```
//! use corpus::{batch_corpus, TextRecord};
//!
//! let records = vec![TextRecord::from("abcdefgh"), TextRecord::from("xyz")];
//! let batches: Vec<_> = batch_corpus(records, 3, 2).unwrap().collect();
//!
//! assert_eq!(batches.len(), 2);
//! assert_eq!(batches[0].chunks, vec!["abc", "def"]);
//! assert_eq!(batches[1].chunks, vec!["gh", "xyz"]);
//! assert_eq!(batches[1].index, 1);
//! ```

mod batcher;
mod chunker;
mod error;
mod record;
mod source;

pub use crate::batcher::{Batch, Batcher};
pub use crate::chunker::{chunk_text, char_len, Chunk, Chunker, TextChunks};
pub use crate::error::{ChunkingError, DatasetError};
pub use crate::record::TextRecord;
pub use crate::source::{sample_size, DatasetSource, InMemoryDataset, JsonlDataset};

/// Default maximum chunk length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 400;

/// Default number of chunks per batch.
pub const DEFAULT_BATCH_SIZE: usize = 128;

/// Chain [`Chunker`] and [`Batcher`] over a record stream.
///
/// Both sizes are validated up front so a bad config fails before any record
/// is read.
pub fn batch_corpus<I>(
    records: I,
    chunk_size: usize,
    batch_size: usize,
) -> Result<Batcher<Chunker<I::IntoIter>>, ChunkingError>
where
    I: IntoIterator,
    I::Item: Into<TextRecord>,
{
    let chunks = Chunker::new(records, chunk_size)?;
    Batcher::new(chunks, batch_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_corpus_chains_both_stages() {
        let records = vec!["a".repeat(10), "b".repeat(5)];
        let batches: Vec<Batch> = batch_corpus(records, 4, 3).unwrap().collect();

        // 10 -> 4,4,2 ; 5 -> 4,1 => five chunks, batches of 3 + 2
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(batches[1].len(), 2);
        assert_eq!(batches[1].chunks, vec!["bbbb", "b"]);
        assert_eq!(batches.iter().map(Batch::n_chars).sum::<u64>(), 15);
    }

    #[test]
    fn batch_corpus_rejects_zero_sizes_before_reading() {
        let records = vec!["never read"];
        assert!(matches!(
            batch_corpus(records.clone(), 0, 10),
            Err(ChunkingError::ZeroChunkSize)
        ));
        assert!(matches!(
            batch_corpus(records, 10, 0),
            Err(ChunkingError::ZeroBatchSize)
        ));
    }

    #[test]
    fn defaults_match_reference_run() {
        assert_eq!(DEFAULT_CHUNK_SIZE, 400);
        assert_eq!(DEFAULT_BATCH_SIZE, 128);
    }
}
