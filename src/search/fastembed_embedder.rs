//! FastEmbed-backed ML embedder.
//!
//! Wraps a `fastembed::TextEmbedding` ONNX model. Model files are resolved
//! through fastembed's cache directory, which the registry points at
//! `<data_dir>/models`. Inference is serialized behind a mutex; the ONNX
//! session is not shared across concurrent calls.

use std::path::Path;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use tracing::info;

use super::embedder::{Embedder, EmbedderError, EmbedderResult, l2_normalize};

/// Batch size handed to fastembed when embedding a corpus.
const EMBED_BATCH_SIZE: usize = 64;

pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    id: String,
    dimension: usize,
}

impl FastEmbedder {
    /// Load a model into memory, downloading it into `cache_dir` on first use.
    pub fn load(
        model: EmbeddingModel,
        id: &str,
        dimension: usize,
        cache_dir: &Path,
    ) -> EmbedderResult<Self> {
        info!(embedder = id, cache_dir = %cache_dir.display(), "embedder_load");
        let options = InitOptions::new(model)
            .with_cache_dir(cache_dir.to_path_buf())
            .with_show_download_progress(false);
        let model = TextEmbedding::try_new(options).map_err(|e| {
            EmbedderError::Unavailable(format!("failed to load embedder '{id}': {e}"))
        })?;
        Ok(Self {
            model: Mutex::new(model),
            id: id.to_string(),
            dimension,
        })
    }

    fn check_dimensions(&self, vectors: &mut [Vec<f32>]) -> EmbedderResult<()> {
        for vector in vectors.iter_mut() {
            if vector.len() != self.dimension {
                return Err(EmbedderError::Failed(format!(
                    "embedder '{}' returned dimension {}, expected {}",
                    self.id,
                    vector.len(),
                    self.dimension
                )));
            }
            l2_normalize(vector);
        }
        Ok(())
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, text: &str) -> EmbedderResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text])?;
        vectors
            .pop()
            .ok_or_else(|| EmbedderError::Failed("embedder returned no vector".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> EmbedderResult<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbedderError::InvalidInput("empty text".to_string()));
        }
        let mut model = self.model.lock();
        let mut vectors = model
            .embed(texts.to_vec(), Some(EMBED_BATCH_SIZE))
            .map_err(|e| EmbedderError::Failed(e.to_string()))?;
        drop(model);
        self.check_dimensions(&mut vectors)?;
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn is_semantic(&self) -> bool {
        true
    }
}
