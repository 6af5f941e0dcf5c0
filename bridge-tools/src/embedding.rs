//! Text embeddings used by the hybrid search strategy.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use thiserror::Error;

use crate::search::words;

/// Errors raised while embedding text.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The model could not produce an embedding.
    #[error("embedding model failed: {reason}")]
    Model {
        /// Explanation reported by the model.
        reason: String,
    },
    /// A batch call returned a different number of vectors than inputs.
    #[error("embedding batch returned {actual} vectors for {expected} inputs")]
    BatchSize {
        /// Number of texts submitted.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },
}

impl EmbeddingError {
    /// Builds a [`EmbeddingError::Model`] error.
    #[must_use]
    pub fn model(reason: impl Into<String>) -> Self {
        Self::Model {
            reason: reason.into(),
        }
    }
}

/// Result alias for embedding operations.
pub type EmbeddingResult<T> = std::result::Result<T, EmbeddingError>;

/// Maps text to dense vectors comparable by cosine similarity.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Embeds several texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Offline model that hashes lowercased words into a fixed number of buckets.
///
/// Texts sharing words land near each other, which is enough to rank tools
/// without a learned model.
#[derive(Debug, Clone, Copy)]
pub struct HashedWordEmbedding {
    dimensions: usize,
}

impl HashedWordEmbedding {
    /// Bucket count used when none is configured.
    pub const DEFAULT_DIMENSIONS: usize = 256;

    /// Creates a model with `dimensions` buckets (at least one).
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Returns the vector length produced by this model.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Default for HashedWordEmbedding {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingModel for HashedWordEmbedding {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut vector = vec![0.0; self.dimensions];
        for word in words(text) {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let bucket = usize::try_from(hasher.finish() % self.dimensions as u64)
                .map_err(|err| EmbeddingError::model(err.to_string()))?;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }
}

/// Cosine similarity of two vectors; `0.0` when either is zero or the
/// lengths differ.
#[must_use]
pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> f32 {
    if lhs.len() != rhs.len() {
        return 0.0;
    }
    let dot: f32 = lhs.iter().zip(rhs).map(|(a, b)| a * b).sum();
    let magnitude = |values: &[f32]| values.iter().map(|v| v * v).sum::<f32>().sqrt();
    let denominator = magnitude(lhs) * magnitude(rhs);
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shared_words_score_higher_than_disjoint_text() {
        let model = HashedWordEmbedding::default();
        let query = model.embed("weather in Oslo").await.unwrap();
        let close = model.embed("Daily WEATHER forecast").await.unwrap();
        let far = model.embed("quote a ticker").await.unwrap();

        assert_eq!(query.len(), HashedWordEmbedding::DEFAULT_DIMENSIONS);
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[tokio::test]
    async fn batch_embeds_in_input_order() {
        let model = HashedWordEmbedding::new(32);
        let texts = vec!["alpha".to_owned(), "beta".to_owned()];
        let batch = model.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], model.embed("beta").await.unwrap());
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }
}
