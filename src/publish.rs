use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use corpus::Batch;
use dispatch::EmbeddingResult;
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
struct EmbeddedChunk<'a> {
    batch: u64,
    text: &'a str,
    embedding: &'a [f32],
}

/// Write every chunk with its embedding as one JSON line, in batch order.
///
/// Returns the number of lines written.
pub fn publish_embeddings(
    path: &Path,
    batches: &[Batch],
    results: &[EmbeddingResult],
) -> io::Result<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    let mut written = 0;
    for (batch, result) in batches.iter().zip(results) {
        for (text, embedding) in batch.chunks.iter().zip(&result.embeddings) {
            let row = EmbeddedChunk {
                batch: batch.index,
                text,
                embedding,
            };
            serde_json::to_writer(&mut out, &row)?;
            out.write_all(b"\n")?;
            written += 1;
        }
    }
    out.flush()?;
    info!(path = %path.display(), rows = written, "embeddings_published");
    Ok(written)
}
