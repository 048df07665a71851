//! Embedder trait for coarse (bi-encoder) retrieval.
//!
//! An embedder turns text into a dense vector. Implementations must be
//! deterministic for a given model id: cached corpus vectors are only
//! reusable if the same text always produces the same vector.

use thiserror::Error;

/// Errors raised by an embedding provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbedderError {
    /// Model cannot be reached or loaded.
    #[error("embedder unavailable: {0}")]
    Unavailable(String),

    #[error("invalid embedder input: {0}")]
    InvalidInput(String),

    /// Provider gave up waiting on the model.
    #[error("embedder timed out after {0} ms")]
    Timeout(u64),

    #[error("embedding failed: {0}")]
    Failed(String),
}

impl EmbedderError {
    /// Whether the error means the model itself is not usable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, EmbedderError::Unavailable(_) | EmbedderError::Timeout(_))
    }
}

pub type EmbedderResult<T> = Result<T, EmbedderError>;

pub trait Embedder: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> EmbedderResult<Vec<f32>>;

    /// Embed several texts. Output order matches input order.
    fn embed_batch(&self, texts: &[&str]) -> EmbedderResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Output dimension.
    fn dimension(&self) -> usize;

    /// Stable identifier; part of the embedding cache key.
    fn id(&self) -> &str;

    /// Whether vectors carry semantic meaning (false for hashing fallbacks).
    fn is_semantic(&self) -> bool;
}

/// L2-normalize a vector in place. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
