use crate::error::ChunkingError;
use crate::record::TextRecord;

/// A slice of record text, at most `chunk_size` characters long.
pub type Chunk = String;

/// Character count used everywhere lengths matter.
#[inline]
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset just past the first `n` characters of `s` (or `s.len()`).
#[inline]
fn byte_offset_after_chars(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(idx, _)| idx)
}

/// Borrowing chunk iterator over a single string. See [`chunk_text`].
#[derive(Debug, Clone)]
pub struct TextChunks<'a> {
    rest: &'a str,
    chunk_size: usize,
}

impl<'a> Iterator for TextChunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let end = byte_offset_after_chars(self.rest, self.chunk_size);
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        Some(head)
    }
}

impl std::iter::FusedIterator for TextChunks<'_> {}

/// Split one string into consecutive pieces of at most `chunk_size` characters.
///
/// ```
/// let pieces: Vec<_> = corpus::chunk_text("hello world", 4).unwrap().collect();
/// assert_eq!(pieces, vec!["hell", "o wo", "rld"]);
/// ```
pub fn chunk_text(text: &str, chunk_size: usize) -> Result<TextChunks<'_>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::ZeroChunkSize);
    }
    Ok(TextChunks {
        rest: text,
        chunk_size,
    })
}

/// Lazy chunk stream over a record stream.
///
/// Records are pulled one at a time and only when the previous record's text
/// is fully emitted, so memory stays bounded by the largest single record.
#[derive(Debug)]
pub struct Chunker<I> {
    records: I,
    chunk_size: usize,
    current: String,
    offset: usize,
}

impl<I> Chunker<I>
where
    I: Iterator,
    I::Item: Into<TextRecord>,
{
    pub fn new<R>(records: R, chunk_size: usize) -> Result<Self, ChunkingError>
    where
        R: IntoIterator<IntoIter = I>,
    {
        if chunk_size == 0 {
            return Err(ChunkingError::ZeroChunkSize);
        }
        Ok(Self {
            records: records.into_iter(),
            chunk_size,
            current: String::new(),
            offset: 0,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl<I> Iterator for Chunker<I>
where
    I: Iterator,
    I::Item: Into<TextRecord>,
{
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        loop {
            if self.offset < self.current.len() {
                let rest = &self.current[self.offset..];
                let end = byte_offset_after_chars(rest, self.chunk_size);
                let chunk = rest[..end].to_owned();
                self.offset += end;
                return Some(chunk);
            }

            // Empty records fall straight through to the next one.
            let record: TextRecord = self.records.next()?.into();
            self.current = record.text;
            self.offset = 0;
        }
    }
}
