use serde::{Deserialize, Serialize};

/// Embeddings for one batch plus the character count it covered.
///
/// `embeddings[i]` belongs to the i-th chunk of the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub embeddings: Vec<Vec<f32>>,
    pub n_chars: u64,
}

impl EmbeddingResult {
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}
